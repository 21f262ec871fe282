//! Software secure element.
//!
//! Implements the full hardware contract in process memory so the service layer
//! can run on hosts without a secure element, and so tests can observe exactly
//! which hardware calls a service operation makes.

use crate::adapters::SecureElementHal;
use crate::crypto::{self, split_mode};
use crate::error::{HalError, HalResult};
use crate::hal::{
    HalAesParam, HalData, HalEcdsaCurve, HalEcdsaMode, HalHashType, HalHmacType, HalKeyType,
    HalRsaAlgorithm, HalRsaMode,
};
use crate::hash;
use crate::types::SlotIndex;
use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use std::collections::HashMap;
use tracing::{debug, trace};
use zeroize::Zeroizing;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftSeConfig {
    pub slot_count: u32,
    pub max_random_len: usize,
    pub rsa_public_exponent: u64,
}

impl Default for SoftSeConfig {
    fn default() -> Self {
        Self {
            slot_count: 32,
            max_random_len: 4096,
            rsa_public_exponent: 65537,
        }
    }
}

enum KeyMaterial {
    Aes(Zeroizing<Vec<u8>>),
    Hmac(Zeroizing<Vec<u8>>),
    Rsa(RsaPrivateKey),
    RsaPublic(RsaPublicKey),
    P256(p256::ecdsa::SigningKey),
    P256Public(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::SigningKey),
    P384Public(p384::ecdsa::VerifyingKey),
}

struct KeySlot {
    key_type: HalKeyType,
    material: KeyMaterial,
}

pub struct SoftSecureElement {
    config: SoftSeConfig,
    initialized: bool,
    keys: HashMap<SlotIndex, KeySlot>,
    storage: HashMap<SlotIndex, Zeroizing<Vec<u8>>>,
    certificates: HashMap<SlotIndex, Vec<u8>>,
    calls: u64,
    injected: Option<HalError>,
}

impl Default for SoftSecureElement {
    fn default() -> Self {
        Self::new(SoftSeConfig::default())
    }
}

impl SoftSecureElement {
    pub fn new(config: SoftSeConfig) -> Self {
        Self {
            config,
            initialized: false,
            keys: HashMap::new(),
            storage: HashMap::new(),
            certificates: HashMap::new(),
            calls: 0,
            injected: None,
        }
    }

    /// Preloads a DER certificate into `slot`.
    pub fn with_certificate(mut self, slot: SlotIndex, der: &[u8]) -> Self {
        self.certificates.insert(slot, der.to_vec());
        self
    }

    pub fn config(&self) -> &SoftSeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of hardware calls received so far, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls
    }

    /// Makes the next hardware call fail with `err`.
    pub fn fail_next(&mut self, err: HalError) {
        self.injected = Some(err);
    }

    fn count(&mut self, op: &'static str) -> HalResult<()> {
        self.calls += 1;
        trace!(op, call = self.calls, "soft secure element call");
        if let Some(err) = self.injected.take() {
            debug!(op, %err, "injected failure");
            return Err(err);
        }
        Ok(())
    }

    fn begin(&mut self, op: &'static str) -> HalResult<()> {
        self.count(op)?;
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        Ok(())
    }

    fn check_slot(&self, slot: SlotIndex) -> HalResult<()> {
        if slot.0 >= self.config.slot_count {
            return Err(HalError::InvalidSlotRange);
        }
        Ok(())
    }

    fn key(&self, slot: SlotIndex) -> HalResult<&KeySlot> {
        self.check_slot(slot)?;
        self.keys.get(&slot).ok_or(HalError::EmptySlot)
    }

    fn typed_key(&self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<&KeySlot> {
        let entry = self.key(slot)?;
        if entry.key_type != key_type {
            return Err(HalError::BadKey);
        }
        Ok(entry)
    }

    fn aes_key(&self, slot: SlotIndex) -> HalResult<&[u8]> {
        match &self.key(slot)?.material {
            KeyMaterial::Aes(key) => Ok(key.as_slice()),
            _ => Err(HalError::BadKey),
        }
    }

    fn store_key(&mut self, slot: SlotIndex, key_type: HalKeyType, material: KeyMaterial) {
        if self.keys.insert(slot, KeySlot { key_type, material }).is_some() {
            debug!(%slot, "replaced key");
        }
    }

    fn generate_material(&self, key_type: HalKeyType) -> HalResult<KeyMaterial> {
        if let Some(len) = aes_key_len(key_type) {
            return random(len).map(KeyMaterial::Aes);
        }
        if let Some(len) = hmac_key_len(key_type) {
            return random(len).map(KeyMaterial::Hmac);
        }
        if let Some(bits) = rsa_bits(key_type) {
            let exponent = BigUint::from(self.config.rsa_public_exponent);
            let key = RsaPrivateKey::new_with_exp(&mut OsRng, bits, &exponent)
                .map_err(|e| HalError::Fail(e.to_string()))?;
            return Ok(KeyMaterial::Rsa(key));
        }
        match key_type {
            HalKeyType::EccSecP256r1 => {
                Ok(KeyMaterial::P256(p256::ecdsa::SigningKey::random(&mut OsRng)))
            }
            HalKeyType::EccSecP384r1 => {
                Ok(KeyMaterial::P384(p384::ecdsa::SigningKey::random(&mut OsRng)))
            }
            _ => Err(HalError::NotSupported),
        }
    }

    fn import_material(
        key_type: HalKeyType,
        public: &HalData,
        private: &HalData,
    ) -> HalResult<KeyMaterial> {
        let raw = if private.data.is_empty() {
            &public.data
        } else {
            &private.data
        };
        if let Some(len) = aes_key_len(key_type) {
            if raw.len() != len {
                return Err(HalError::InvalidArgs);
            }
            return Ok(KeyMaterial::Aes(Zeroizing::new(raw.clone())));
        }
        if hmac_key_len(key_type).is_some() {
            if raw.is_empty() {
                return Err(HalError::InvalidArgs);
            }
            return Ok(KeyMaterial::Hmac(Zeroizing::new(raw.clone())));
        }
        if let Some(bits) = rsa_bits(key_type) {
            let material = if private.data.is_empty() {
                let key = RsaPublicKey::from_pkcs1_der(&public.data).map_err(|_| HalError::BadKey)?;
                check_modulus(key.size(), bits)?;
                KeyMaterial::RsaPublic(key)
            } else {
                let key =
                    RsaPrivateKey::from_pkcs1_der(&private.data).map_err(|_| HalError::BadKey)?;
                check_modulus(key.size(), bits)?;
                KeyMaterial::Rsa(key)
            };
            return Ok(material);
        }
        match key_type {
            HalKeyType::EccSecP256r1 if !private.data.is_empty() => {
                p256::ecdsa::SigningKey::from_slice(&private.data)
                    .map(KeyMaterial::P256)
                    .map_err(|_| HalError::BadKey)
            }
            HalKeyType::EccSecP256r1 => {
                p256::ecdsa::VerifyingKey::from_sec1_bytes(&uncompressed_point(public))
                    .map(KeyMaterial::P256Public)
                    .map_err(|_| HalError::BadKey)
            }
            HalKeyType::EccSecP384r1 if !private.data.is_empty() => {
                p384::ecdsa::SigningKey::from_slice(&private.data)
                    .map(KeyMaterial::P384)
                    .map_err(|_| HalError::BadKey)
            }
            HalKeyType::EccSecP384r1 => {
                p384::ecdsa::VerifyingKey::from_sec1_bytes(&uncompressed_point(public))
                    .map(KeyMaterial::P384Public)
                    .map_err(|_| HalError::BadKey)
            }
            _ => Err(HalError::NotSupported),
        }
    }

    fn rsa_public(&self, slot: SlotIndex) -> HalResult<RsaPublicKey> {
        match &self.key(slot)?.material {
            KeyMaterial::Rsa(key) => Ok(key.to_public_key()),
            KeyMaterial::RsaPublic(key) => Ok(key.clone()),
            _ => Err(HalError::BadKey),
        }
    }
}

fn aes_key_len(key_type: HalKeyType) -> Option<usize> {
    match key_type {
        HalKeyType::Aes128 => Some(16),
        HalKeyType::Aes192 => Some(24),
        HalKeyType::Aes256 => Some(32),
        _ => None,
    }
}

/// HMAC keys are generated at the digest length. MD5 and SHA-1 are not carried.
fn hmac_key_len(key_type: HalKeyType) -> Option<usize> {
    match key_type {
        HalKeyType::HmacSha224 => Some(28),
        HalKeyType::HmacSha256 => Some(32),
        HalKeyType::HmacSha384 => Some(48),
        HalKeyType::HmacSha512 => Some(64),
        _ => None,
    }
}

fn rsa_bits(key_type: HalKeyType) -> Option<usize> {
    match key_type {
        HalKeyType::Rsa1024 => Some(1024),
        HalKeyType::Rsa2048 => Some(2048),
        HalKeyType::Rsa3072 => Some(3072),
        HalKeyType::Rsa4096 => Some(4096),
        _ => None,
    }
}

fn check_modulus(size_bytes: usize, bits: usize) -> HalResult<()> {
    if size_bytes * 8 != bits {
        return Err(HalError::BadKey);
    }
    Ok(())
}

fn random(len: usize) -> HalResult<Zeroizing<Vec<u8>>> {
    crypto::random_bytes(len)
        .map(Zeroizing::new)
        .map_err(HalError::Fail)
}

/// SEC1 uncompressed encoding of a public key given as x (primary) and y
/// (auxiliary).
fn uncompressed_point(public: &HalData) -> Vec<u8> {
    let mut point = Vec::with_capacity(1 + public.data_len() + public.priv_len());
    point.push(0x04);
    point.extend_from_slice(&public.data);
    point.extend_from_slice(&public.priv_data);
    point
}

fn split_point(encoded: &[u8], coordinate_len: usize) -> HalResult<HalData> {
    if encoded.len() != 1 + 2 * coordinate_len {
        return Err(HalError::Fail("unexpected point encoding".to_string()));
    }
    let (x, y) = encoded[1..].split_at(coordinate_len);
    Ok(HalData::with_priv(x.to_vec(), y.to_vec()))
}

fn oaep(hash: HalHashType) -> HalResult<Oaep> {
    match hash {
        HalHashType::Sha224 => Ok(Oaep::new::<Sha224>()),
        HalHashType::Sha256 => Ok(Oaep::new::<Sha256>()),
        HalHashType::Sha384 => Ok(Oaep::new::<Sha384>()),
        HalHashType::Sha512 => Ok(Oaep::new::<Sha512>()),
        _ => Err(HalError::NotSupported),
    }
}

fn rsa_error(err: rsa::Error) -> HalError {
    match err {
        rsa::Error::MessageTooLong => HalError::InvalidArgs,
        rsa::Error::Decryption => HalError::Fail("decryption failed".to_string()),
        other => HalError::Fail(other.to_string()),
    }
}

fn curve_matches(curve: HalEcdsaCurve, material: &KeyMaterial) -> bool {
    matches!(
        (curve, material),
        (HalEcdsaCurve::SecP256r1, KeyMaterial::P256(_) | KeyMaterial::P256Public(_))
            | (HalEcdsaCurve::SecP384r1, KeyMaterial::P384(_) | KeyMaterial::P384Public(_))
    )
}

fn compute_hmac(hmac_type: HalHmacType, key: &[u8], input: &[u8]) -> HalResult<Vec<u8>> {
    let out = match hmac_type {
        HalHmacType::Sha224 => {
            let mut mac = <Hmac<Sha224> as Mac>::new_from_slice(key).map_err(|_| HalError::BadKey)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HalHmacType::Sha256 => {
            let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| HalError::BadKey)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HalHmacType::Sha384 => {
            let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(key).map_err(|_| HalError::BadKey)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HalHmacType::Sha512 => {
            let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key).map_err(|_| HalError::BadKey)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HalHmacType::Md5 | HalHmacType::Sha1 | HalHmacType::Unknown => {
            return Err(HalError::NotSupported)
        }
    };
    Ok(out)
}

impl SecureElementHal for SoftSecureElement {
    fn init(&mut self) -> HalResult<()> {
        self.count("init")?;
        if self.initialized {
            return Err(HalError::InvalidRequest);
        }
        self.initialized = true;
        debug!(slots = self.config.slot_count, "soft secure element up");
        Ok(())
    }

    fn deinit(&mut self) -> HalResult<()> {
        self.begin("deinit")?;
        self.initialized = false;
        debug!("soft secure element down");
        Ok(())
    }

    fn generate_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
        self.begin("generate_key")?;
        self.check_slot(slot)?;
        let material = self.generate_material(key_type)?;
        self.store_key(slot, key_type, material);
        debug!(?key_type, %slot, "generated key");
        Ok(())
    }

    fn set_key(
        &mut self,
        key_type: HalKeyType,
        slot: SlotIndex,
        public: &HalData,
        private: &HalData,
    ) -> HalResult<()> {
        self.begin("set_key")?;
        self.check_slot(slot)?;
        let material = Self::import_material(key_type, public, private)?;
        self.store_key(slot, key_type, material);
        debug!(?key_type, %slot, "imported key");
        Ok(())
    }

    fn get_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<HalData> {
        self.begin("get_key")?;
        let entry = self.typed_key(key_type, slot)?;
        match &entry.material {
            KeyMaterial::Aes(_) | KeyMaterial::Hmac(_) => Err(HalError::NotSupported),
            KeyMaterial::Rsa(key) => encode_rsa_public(&key.to_public_key()),
            KeyMaterial::RsaPublic(key) => encode_rsa_public(key),
            KeyMaterial::P256(key) => {
                let point = key.verifying_key().as_affine().to_encoded_point(false);
                split_point(point.as_bytes(), 32)
            }
            KeyMaterial::P256Public(key) => {
                split_point(key.as_affine().to_encoded_point(false).as_bytes(), 32)
            }
            KeyMaterial::P384(key) => {
                let point = key.verifying_key().as_affine().to_encoded_point(false);
                split_point(point.as_bytes(), 48)
            }
            KeyMaterial::P384Public(key) => {
                split_point(key.as_affine().to_encoded_point(false).as_bytes(), 48)
            }
        }
    }

    fn remove_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
        self.begin("remove_key")?;
        self.typed_key(key_type, slot)?;
        // Dropping the material wipes it.
        self.keys.remove(&slot);
        debug!(?key_type, %slot, "removed key");
        Ok(())
    }

    fn aes_encrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("aes_encrypt")?;
        if split_mode(param.mode).is_none() {
            return Err(HalError::NotSupported);
        }
        let key = self.aes_key(slot)?;
        crypto::aes_encrypt(key, param.mode, &param.iv, &input.data)
            .map(HalData::new)
            .map_err(|_| HalError::InvalidArgs)
    }

    fn aes_decrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("aes_decrypt")?;
        if split_mode(param.mode).is_none() {
            return Err(HalError::NotSupported);
        }
        let key = self.aes_key(slot)?;
        crypto::aes_decrypt(key, param.mode, &param.iv, &input.data)
            .map(HalData::new)
            .map_err(|_| HalError::InvalidArgs)
    }

    fn rsa_encrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("rsa_encrypt")?;
        let key = self.rsa_public(slot)?;
        let out = match mode.rsa_a {
            HalRsaAlgorithm::RsassaPkcs1V15 => {
                key.encrypt(&mut OsRng, Pkcs1v15Encrypt, &input.data)
            }
            HalRsaAlgorithm::RsassaPkcs1PssMgf1 => {
                key.encrypt(&mut OsRng, oaep(mode.hash)?, &input.data)
            }
            HalRsaAlgorithm::Unknown => return Err(HalError::NotSupported),
        };
        out.map(HalData::new).map_err(rsa_error)
    }

    fn rsa_decrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("rsa_decrypt")?;
        let KeyMaterial::Rsa(key) = &self.key(slot)?.material else {
            return Err(HalError::BadKey);
        };
        let out = match mode.rsa_a {
            HalRsaAlgorithm::RsassaPkcs1V15 => key.decrypt(Pkcs1v15Encrypt, &input.data),
            HalRsaAlgorithm::RsassaPkcs1PssMgf1 => key.decrypt(oaep(mode.hash)?, &input.data),
            HalRsaAlgorithm::Unknown => return Err(HalError::NotSupported),
        };
        out.map(HalData::new).map_err(rsa_error)
    }

    fn ecdsa_sign_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("ecdsa_sign_md")?;
        let entry = self.key(slot)?;
        if !curve_matches(mode.curve, &entry.material) {
            return Err(HalError::InvalidArgs);
        }
        let signature = match &entry.material {
            KeyMaterial::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(&hash.data)
                    .map_err(|_| HalError::InvalidArgs)?;
                sig.to_bytes().to_vec()
            }
            KeyMaterial::P384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(&hash.data)
                    .map_err(|_| HalError::InvalidArgs)?;
                sig.to_bytes().to_vec()
            }
            _ => return Err(HalError::BadKey),
        };
        Ok(HalData::new(signature))
    }

    fn ecdsa_verify_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        signature: &HalData,
        slot: SlotIndex,
    ) -> HalResult<()> {
        self.begin("ecdsa_verify_md")?;
        let entry = self.key(slot)?;
        if !curve_matches(mode.curve, &entry.material) {
            return Err(HalError::InvalidArgs);
        }
        let verified = match &entry.material {
            KeyMaterial::P256(key) => verify_p256(key.verifying_key(), hash, signature),
            KeyMaterial::P256Public(key) => verify_p256(key, hash, signature),
            KeyMaterial::P384(key) => verify_p384(key.verifying_key(), hash, signature),
            KeyMaterial::P384Public(key) => verify_p384(key, hash, signature),
            _ => return Err(HalError::BadKey),
        };
        verified.map_err(|_| HalError::Fail("signature mismatch".to_string()))
    }

    fn write_storage(&mut self, slot: SlotIndex, data: &HalData) -> HalResult<()> {
        self.begin("write_storage")?;
        self.check_slot(slot)?;
        self.storage.insert(slot, Zeroizing::new(data.data.clone()));
        trace!(%slot, len = data.data_len(), "stored record");
        Ok(())
    }

    fn read_storage(&mut self, slot: SlotIndex) -> HalResult<HalData> {
        self.begin("read_storage")?;
        self.check_slot(slot)?;
        self.storage
            .get(&slot)
            .map(|record| HalData::from_slice(record))
            .ok_or(HalError::EmptySlot)
    }

    fn delete_storage(&mut self, slot: SlotIndex) -> HalResult<()> {
        self.begin("delete_storage")?;
        self.check_slot(slot)?;
        self.storage.remove(&slot).map(|_| ()).ok_or(HalError::EmptySlot)
    }

    fn generate_random(&mut self, len: u32) -> HalResult<HalData> {
        self.begin("generate_random")?;
        let len = usize::try_from(len).map_err(|_| HalError::InvalidArgs)?;
        if len > self.config.max_random_len {
            return Err(HalError::InvalidArgs);
        }
        crypto::random_bytes(len).map(HalData::new).map_err(HalError::Fail)
    }

    fn get_hash(&mut self, hash_type: HalHashType, input: &HalData) -> HalResult<HalData> {
        self.begin("get_hash")?;
        hash::digest(hash_type, &input.data)
            .map(HalData::new)
            .ok_or(HalError::NotSupported)
    }

    fn get_hmac(
        &mut self,
        hmac_type: HalHmacType,
        input: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        self.begin("get_hmac")?;
        let KeyMaterial::Hmac(key) = &self.key(slot)?.material else {
            return Err(HalError::BadKey);
        };
        compute_hmac(hmac_type, key, &input.data).map(HalData::new)
    }

    fn get_certificate(&mut self, slot: SlotIndex) -> HalResult<HalData> {
        self.begin("get_certificate")?;
        self.check_slot(slot)?;
        self.certificates
            .get(&slot)
            .map(|der| HalData::from_slice(der))
            .ok_or(HalError::EmptySlot)
    }
}

fn encode_rsa_public(key: &RsaPublicKey) -> HalResult<HalData> {
    key.to_pkcs1_der()
        .map(|doc| HalData::from_slice(doc.as_bytes()))
        .map_err(|e| HalError::Fail(e.to_string()))
}

fn verify_p256(
    key: &p256::ecdsa::VerifyingKey,
    hash: &HalData,
    signature: &HalData,
) -> Result<(), signature::Error> {
    let sig = p256::ecdsa::Signature::from_slice(&signature.data)?;
    key.verify_prehash(&hash.data, &sig)
}

fn verify_p384(
    key: &p384::ecdsa::VerifyingKey,
    hash: &HalData,
    signature: &HalData,
) -> Result<(), signature::Error> {
    let sig = p384::ecdsa::Signature::from_slice(&signature.data)?;
    key.verify_prehash(&hash.data, &sig)
}
