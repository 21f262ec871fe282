use crate::hal::HalHashType;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// SHA-2 digest of `input`; `None` for hash kinds this build does not carry.
pub fn digest(hash: HalHashType, input: &[u8]) -> Option<Vec<u8>> {
    match hash {
        HalHashType::Sha224 => Some(Sha224::digest(input).to_vec()),
        HalHashType::Sha256 => Some(sha256(input).to_vec()),
        HalHashType::Sha384 => Some(Sha384::digest(input).to_vec()),
        HalHashType::Sha512 => Some(Sha512::digest(input).to_vec()),
        HalHashType::Md5 | HalHashType::Sha1 | HalHashType::Unknown => None,
    }
}
