//! Hardware-layer taxonomy: the enumerations and buffer descriptor the secure
//! element contract speaks in.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalKeyType {
    Aes128,
    Aes192,
    Aes256,
    Rsa1024,
    Rsa2048,
    Rsa3072,
    Rsa4096,
    EccBrainpoolP256r1,
    EccBrainpoolP384r1,
    EccBrainpoolP512r1,
    EccSecP192r1,
    EccSecP224r1,
    EccSecP256r1,
    EccSecP384r1,
    EccSecP521r1,
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    Dh1024,
    Dh2048,
    Dh4096,
    Unknown,
}

impl HalKeyType {
    pub fn is_aes(self) -> bool {
        matches!(self, HalKeyType::Aes128 | HalKeyType::Aes192 | HalKeyType::Aes256)
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            HalKeyType::Rsa1024 | HalKeyType::Rsa2048 | HalKeyType::Rsa3072 | HalKeyType::Rsa4096
        )
    }

    pub fn is_hmac(self) -> bool {
        matches!(
            self,
            HalKeyType::HmacMd5
                | HalKeyType::HmacSha1
                | HalKeyType::HmacSha224
                | HalKeyType::HmacSha256
                | HalKeyType::HmacSha384
                | HalKeyType::HmacSha512
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalHashType {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalHmacType {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalAesMode {
    EcbNoPad,
    EcbIso9797M1,
    EcbIso9797M2,
    EcbPkcs5,
    EcbPkcs7,
    CbcNoPad,
    CbcIso9797M1,
    CbcIso9797M2,
    CbcPkcs5,
    CbcPkcs7,
    Ctr,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalEcdsaCurve {
    BrainpoolP256r1,
    BrainpoolP384r1,
    BrainpoolP512r1,
    SecP192r1,
    SecP224r1,
    SecP256r1,
    SecP384r1,
    SecP521r1,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HalRsaAlgorithm {
    RsassaPkcs1V15,
    RsassaPkcs1PssMgf1,
    Unknown,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HalAesParam {
    pub mode: HalAesMode,
    pub iv: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HalRsaMode {
    pub rsa_a: HalRsaAlgorithm,
    pub hash: HalHashType,
    pub mgf: HalHashType,
    pub salt_byte_len: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HalEcdsaMode {
    pub curve: HalEcdsaCurve,
    pub hash: HalHashType,
}

/// Buffer descriptor used by every hardware response: a primary field plus an
/// auxiliary field for operations that return a second logical output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct HalData {
    pub data: Vec<u8>,
    pub priv_data: Vec<u8>,
}

impl HalData {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            priv_data: Vec::new(),
        }
    }

    pub fn with_priv(data: Vec<u8>, priv_data: Vec<u8>) -> Self {
        Self { data, priv_data }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn priv_len(&self) -> usize {
        self.priv_data.len()
    }
}

impl fmt::Debug for HalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalData")
            .field("data_len", &self.data.len())
            .field("priv_len", &self.priv_data.len())
            .finish()
    }
}
