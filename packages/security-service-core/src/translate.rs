//! Mapping from the application-facing taxonomy to the hardware taxonomy.
//!
//! Every function is total: values without a hardware counterpart map to the
//! hardware `Unknown` variant and are never coerced into a valid one.

use crate::hal::{
  HalAesMode, HalAesParam, HalEcdsaCurve, HalEcdsaMode, HalHashType, HalHmacType, HalKeyType,
  HalRsaAlgorithm, HalRsaMode,
};
use crate::types::{
  AesMode, AesParam, EcdsaCurve, EcdsaMode, HashType, RsaAlgorithm, RsaMode, SecurityAlgorithm,
};

/// Indexed by the external algorithm ordinal.
const KEY_TYPE_TABLE: [HalKeyType; 25] = [
  HalKeyType::Aes128,
  HalKeyType::Aes192,
  HalKeyType::Aes256,
  HalKeyType::Rsa1024,
  HalKeyType::Rsa2048,
  HalKeyType::Rsa3072,
  HalKeyType::Rsa4096,
  HalKeyType::EccBrainpoolP256r1,
  HalKeyType::EccBrainpoolP384r1,
  HalKeyType::EccBrainpoolP512r1,
  HalKeyType::EccSecP192r1,
  HalKeyType::EccSecP224r1,
  HalKeyType::EccSecP256r1,
  HalKeyType::EccSecP384r1,
  HalKeyType::EccSecP521r1,
  HalKeyType::HmacMd5,
  HalKeyType::HmacSha1,
  HalKeyType::HmacSha224,
  HalKeyType::HmacSha256,
  HalKeyType::HmacSha384,
  HalKeyType::HmacSha512,
  HalKeyType::Dh1024,
  HalKeyType::Dh2048,
  HalKeyType::Dh4096,
  HalKeyType::Unknown,
];

/// Table lookup by raw ordinal. Out-of-range ordinals yield `Unknown`.
pub fn algorithm_ordinal_to_hal(ordinal: usize) -> HalKeyType {
  KEY_TYPE_TABLE
    .get(ordinal)
    .copied()
    .unwrap_or(HalKeyType::Unknown)
}

pub fn algorithm_to_hal(algo: SecurityAlgorithm) -> HalKeyType {
  algorithm_ordinal_to_hal(algo.ordinal())
}

pub fn hash_to_hal(hash: HashType) -> HalHashType {
  match hash {
    HashType::Md5 => HalHashType::Md5,
    HashType::Sha1 => HalHashType::Sha1,
    HashType::Sha224 => HalHashType::Sha224,
    HashType::Sha256 => HalHashType::Sha256,
    HashType::Sha384 => HalHashType::Sha384,
    HashType::Sha512 => HalHashType::Sha512,
    HashType::Unknown => HalHashType::Unknown,
  }
}

/// Only the HMAC members of the algorithm taxonomy have a counterpart.
pub fn hmac_to_hal(algo: SecurityAlgorithm) -> HalHmacType {
  match algo {
    SecurityAlgorithm::HmacMd5 => HalHmacType::Md5,
    SecurityAlgorithm::HmacSha1 => HalHmacType::Sha1,
    SecurityAlgorithm::HmacSha224 => HalHmacType::Sha224,
    SecurityAlgorithm::HmacSha256 => HalHmacType::Sha256,
    SecurityAlgorithm::HmacSha384 => HalHmacType::Sha384,
    SecurityAlgorithm::HmacSha512 => HalHmacType::Sha512,
    _ => HalHmacType::Unknown,
  }
}

pub fn aes_mode_to_hal(mode: AesMode) -> HalAesMode {
  match mode {
    AesMode::EcbNoPad => HalAesMode::EcbNoPad,
    AesMode::EcbIso9797M1 => HalAesMode::EcbIso9797M1,
    AesMode::EcbIso9797M2 => HalAesMode::EcbIso9797M2,
    AesMode::EcbPkcs5 => HalAesMode::EcbPkcs5,
    AesMode::EcbPkcs7 => HalAesMode::EcbPkcs7,
    AesMode::CbcNoPad => HalAesMode::CbcNoPad,
    AesMode::CbcIso9797M1 => HalAesMode::CbcIso9797M1,
    AesMode::CbcIso9797M2 => HalAesMode::CbcIso9797M2,
    AesMode::CbcPkcs5 => HalAesMode::CbcPkcs5,
    AesMode::CbcPkcs7 => HalAesMode::CbcPkcs7,
    AesMode::Ctr => HalAesMode::Ctr,
    AesMode::Unknown => HalAesMode::Unknown,
  }
}

pub fn curve_to_hal(curve: EcdsaCurve) -> HalEcdsaCurve {
  match curve {
    EcdsaCurve::BrainpoolP256r1 => HalEcdsaCurve::BrainpoolP256r1,
    EcdsaCurve::BrainpoolP384r1 => HalEcdsaCurve::BrainpoolP384r1,
    EcdsaCurve::BrainpoolP512r1 => HalEcdsaCurve::BrainpoolP512r1,
    EcdsaCurve::SecP192r1 => HalEcdsaCurve::SecP192r1,
    EcdsaCurve::SecP224r1 => HalEcdsaCurve::SecP224r1,
    EcdsaCurve::SecP256r1 => HalEcdsaCurve::SecP256r1,
    EcdsaCurve::SecP384r1 => HalEcdsaCurve::SecP384r1,
    EcdsaCurve::SecP521r1 => HalEcdsaCurve::SecP521r1,
    EcdsaCurve::Unknown => HalEcdsaCurve::Unknown,
  }
}

pub fn rsa_algorithm_to_hal(algo: RsaAlgorithm) -> HalRsaAlgorithm {
  match algo {
    RsaAlgorithm::RsassaPkcs1V15 => HalRsaAlgorithm::RsassaPkcs1V15,
    RsaAlgorithm::RsassaPkcs1PssMgf1 => HalRsaAlgorithm::RsassaPkcs1PssMgf1,
    RsaAlgorithm::Unknown => HalRsaAlgorithm::Unknown,
  }
}

pub fn aes_param_to_hal(param: &AesParam) -> HalAesParam {
  HalAesParam {
    mode: aes_mode_to_hal(param.mode),
    iv: param.iv.clone(),
  }
}

pub fn rsa_mode_to_hal(mode: &RsaMode) -> HalRsaMode {
  HalRsaMode {
    rsa_a: rsa_algorithm_to_hal(mode.rsa_a),
    hash: hash_to_hal(mode.hash),
    mgf: hash_to_hal(mode.mgf),
    salt_byte_len: mode.salt_byte_len,
  }
}

pub fn ecdsa_mode_to_hal(mode: &EcdsaMode) -> HalEcdsaMode {
  HalEcdsaMode {
    curve: curve_to_hal(mode.curve),
    hash: hash_to_hal(mode.hash),
  }
}
