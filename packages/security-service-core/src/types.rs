use std::fmt;

/// Secure-element-local slot holding one key or one storage record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct SlotIndex(pub u32);

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Application-facing key algorithm. Declaration order is the external ordinal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SecurityAlgorithm {
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

impl SecurityAlgorithm {
    pub const ALL: [SecurityAlgorithm; 25] = [
        SecurityAlgorithm::Aes128,
        SecurityAlgorithm::Aes192,
        SecurityAlgorithm::Aes256,
        SecurityAlgorithm::Rsa1024,
        SecurityAlgorithm::Rsa2048,
        SecurityAlgorithm::Rsa3072,
        SecurityAlgorithm::Rsa4096,
        SecurityAlgorithm::EccBrainpoolP256r1,
        SecurityAlgorithm::EccBrainpoolP384r1,
        SecurityAlgorithm::EccBrainpoolP512r1,
        SecurityAlgorithm::EccSecP192r1,
        SecurityAlgorithm::EccSecP224r1,
        SecurityAlgorithm::EccSecP256r1,
        SecurityAlgorithm::EccSecP384r1,
        SecurityAlgorithm::EccSecP521r1,
        SecurityAlgorithm::HmacMd5,
        SecurityAlgorithm::HmacSha1,
        SecurityAlgorithm::HmacSha224,
        SecurityAlgorithm::HmacSha256,
        SecurityAlgorithm::HmacSha384,
        SecurityAlgorithm::HmacSha512,
        SecurityAlgorithm::Dh1024,
        SecurityAlgorithm::Dh2048,
        SecurityAlgorithm::Dh4096,
        SecurityAlgorithm::Unknown,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HashType {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AesMode {
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
pub enum EcdsaCurve {
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
pub enum RsaAlgorithm {
    RsassaPkcs1V15,
    RsassaPkcs1PssMgf1,
    Unknown,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AesParam {
    pub mode: AesMode,
    pub iv: Vec<u8>,
}

impl AesParam {
    pub fn new(mode: AesMode) -> Self {
        Self {
            mode,
            iv: Vec::new(),
        }
    }

    pub fn with_iv(mode: AesMode, iv: &[u8]) -> Self {
        Self {
            mode,
            iv: iv.to_vec(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RsaMode {
    pub rsa_a: RsaAlgorithm,
    pub hash: HashType,
    pub mgf: HashType,
    pub salt_byte_len: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EcdsaMode {
    pub curve: EcdsaCurve,
    pub hash: HashType,
}

/// Finite-field Diffie-Hellman parameters.
#[derive(Clone, Debug, Default)]
pub struct DhParams {
    pub mode: Option<SecurityAlgorithm>,
    pub p: Vec<u8>,
    pub g: Vec<u8>,
    pub pubkey: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct EcdhParams {
    pub curve: EcdsaCurve,
    pub pubkey_x: Vec<u8>,
    pub pubkey_y: Vec<u8>,
}

/// Certificate signing request fields.
#[derive(Clone, Debug, Default)]
pub struct CsrInfo {
    pub issuer_country: String,
    pub issuer_organization: String,
    pub issuer_cn: String,
    pub issuer_key_name: String,
    pub subject_country: String,
    pub subject_organization: String,
    pub subject_cn: String,
    pub subject_key_name: String,
    pub serial: Vec<u8>,
    pub cert_years: u32,
}
