//! Application-facing security service.
//!
//! A [`SecurityContext`] exists only between a successful [`SecurityContext::init`]
//! and [`SecurityContext::deinit`]. Every operation resolves key identifiers to
//! secure element slots, translates descriptors to the hardware taxonomy, makes
//! the hardware call and hands any output back as an owned [`DataBuffer`].
//!
//! Operations take `&mut self`; sharing one context across threads needs an
//! external lock such as `Mutex<SecurityContext<H>>`.

use crate::adapters::SecureElementHal;
use crate::buffer::{self, DataBuffer};
use crate::cbor::CborLimits;
use crate::error::HalError;
use crate::hal::{
  HalAesMode, HalData, HalEcdsaCurve, HalHashType, HalHmacType, HalKeyType, HalRsaAlgorithm,
};
use crate::key_path::{self, KeyPathPolicy};
use crate::link::{LinkMode, SecureLink};
use crate::translate;
use crate::types::{
  AesParam, CsrInfo, DhParams, EcdhParams, EcdsaMode, HashType, RsaMode, SecurityAlgorithm,
  SlotIndex,
};
use tracing::{debug, error, trace};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
  #[error("key identifier does not name a secure element slot")]
  InvalidKeyIndex,
  #[error("invalid input parameters")]
  InvalidInputParams,
  #[error("output allocation failed")]
  AllocError,
  #[error("operation not supported")]
  NotSupported,
  #[error("hardware failure (code {code})")]
  Hardware { code: i32 },
  #[error("unknown command {0:#06x}")]
  UnknownCommand(u32),
  #[error("transport error: {0}")]
  Transport(String),
}

impl From<HalError> for SecurityError {
  fn from(err: HalError) -> Self {
    match err {
      HalError::NotSupported => SecurityError::NotSupported,
      HalError::AllocFail => SecurityError::AllocError,
      HalError::InvalidSlotRange => SecurityError::InvalidKeyIndex,
      HalError::InvalidArgs => SecurityError::InvalidInputParams,
      other => SecurityError::Hardware { code: other.code() },
    }
  }
}

pub type SecurityResult<T> = Result<T, SecurityError>;

/// Integer status codes reported to applications.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityStatus {
  Ok = 0,
  Error = -1,
  AllocError = -2,
  InvalidInputParams = -3,
  InvalidKeyIndex = -4,
  NotSupported = -7,
  UnknownCommand = -9,
  TransportError = -10,
}

impl SecurityStatus {
  pub fn code(self) -> i32 {
    self as i32
  }
}

impl SecurityError {
  pub fn status(&self) -> SecurityStatus {
    match self {
      SecurityError::InvalidKeyIndex => SecurityStatus::InvalidKeyIndex,
      SecurityError::InvalidInputParams => SecurityStatus::InvalidInputParams,
      SecurityError::AllocError => SecurityStatus::AllocError,
      SecurityError::NotSupported => SecurityStatus::NotSupported,
      SecurityError::Hardware { .. } => SecurityStatus::Error,
      SecurityError::UnknownCommand(_) => SecurityStatus::UnknownCommand,
      SecurityError::Transport(_) => SecurityStatus::TransportError,
    }
  }
}

pub fn status_of<T>(result: &SecurityResult<T>) -> i32 {
  match result {
    Ok(_) => SecurityStatus::Ok.code(),
    Err(err) => err.status().code(),
  }
}

#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
  pub link: LinkMode,
  pub key_paths: KeyPathPolicy,
  pub wire_limits: CborLimits,
}

/// Public part of a key. `y` is present only when the hardware returns a
/// second coordinate.
#[derive(Debug)]
pub struct PublicKey {
  pub x: DataBuffer,
  pub y: Option<DataBuffer>,
}

/// Checks a hardware result and logs the failing call site.
macro_rules! hal_call {
  ($op:expr, $call:expr) => {
    ($call).map_err(|err| {
      let err = SecurityError::from(err);
      error!(op = $op, file = file!(), line = line!(), %err, "hardware call failed");
      err
    })
  };
}

pub struct SecurityContext<H: SecureElementHal> {
  link: SecureLink<H>,
  config: SecurityConfig,
}

impl<H: SecureElementHal> SecurityContext<H> {
  pub fn init(mut hal: H, config: SecurityConfig) -> SecurityResult<Self> {
    debug!(op = "init", link = ?config.link, "enter");
    hal_call!("init", hal.init())?;
    Ok(Self {
      link: SecureLink::new(hal, config.link, config.wire_limits.clone()),
      config,
    })
  }

  /// Tears the context down and returns the hardware handle.
  pub fn deinit(self) -> SecurityResult<H> {
    debug!(op = "deinit", "enter");
    let mut hal = self.link.into_hal();
    hal_call!("deinit", hal.deinit())?;
    Ok(hal)
  }

  pub fn config(&self) -> &SecurityConfig {
    &self.config
  }

  pub fn hal(&self) -> &H {
    self.link.hal()
  }

  /// Always 0: the service keeps no status beyond its own liveness.
  pub fn get_status(&self) -> i32 {
    0
  }

  pub fn free_data(&self, data: DataBuffer) {
    let len = data.release();
    trace!(len, "released buffer");
  }

  fn slot(&self, key_id: &str) -> SecurityResult<SlotIndex> {
    key_path::resolve_with(&self.config.key_paths, key_id).map_err(|err| {
      debug!(key_id, "identifier did not resolve");
      err
    })
  }

  // Key management

  pub fn generate_key(&mut self, algorithm: SecurityAlgorithm, key_id: &str) -> SecurityResult<()> {
    debug!(op = "generate_key", ?algorithm, key_id, "enter");
    let key_type = key_type(algorithm)?;
    let slot = self.slot(key_id)?;
    hal_call!("generate_key", self.link.hal_mut().generate_key(key_type, slot))
  }

  /// Imports a key. Elliptic-curve public parts are `x || y`.
  pub fn set_key(
    &mut self,
    algorithm: SecurityAlgorithm,
    key_id: &str,
    public: &[u8],
    private: &[u8],
  ) -> SecurityResult<()> {
    debug!(op = "set_key", ?algorithm, key_id, "enter");
    let key_type = key_type(algorithm)?;
    let slot = self.slot(key_id)?;
    let public = HalData::from_slice(public);
    let private = HalData::from_slice(private);
    hal_call!("set_key", self.link.hal_mut().set_key(key_type, slot, &public, &private))
  }

  pub fn get_key(
    &mut self,
    algorithm: SecurityAlgorithm,
    key_id: &str,
  ) -> SecurityResult<PublicKey> {
    debug!(op = "get_key", ?algorithm, key_id, "enter");
    let key_type = key_type(algorithm)?;
    let slot = self.slot(key_id)?;
    let out = hal_call!("get_key", self.link.hal_mut().get_key(key_type, slot))?;
    let x = buffer::adopt(&out)?;
    let y = if out.priv_len() > 0 {
      Some(buffer::adopt_secondary(&out)?)
    } else {
      None
    };
    Ok(PublicKey { x, y })
  }

  pub fn remove_key(&mut self, algorithm: SecurityAlgorithm, key_id: &str) -> SecurityResult<()> {
    debug!(op = "remove_key", ?algorithm, key_id, "enter");
    let key_type = key_type(algorithm)?;
    let slot = self.slot(key_id)?;
    hal_call!("remove_key", self.link.hal_mut().remove_key(key_type, slot))
  }

  // Crypto

  pub fn aes_encrypt(
    &mut self,
    param: &AesParam,
    key_id: &str,
    input: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "aes_encrypt", mode = ?param.mode, key_id, len = input.len(), "enter");
    let slot = self.slot(key_id)?;
    let param = translate::aes_param_to_hal(param);
    known(param.mode != HalAesMode::Unknown)?;
    let input = HalData::from_slice(input);
    let out = hal_call!("aes_encrypt", self.link.aes_encrypt(&input, &param, slot))?;
    buffer::adopt(&out)
  }

  pub fn aes_decrypt(
    &mut self,
    param: &AesParam,
    key_id: &str,
    input: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "aes_decrypt", mode = ?param.mode, key_id, len = input.len(), "enter");
    let slot = self.slot(key_id)?;
    let param = translate::aes_param_to_hal(param);
    known(param.mode != HalAesMode::Unknown)?;
    let input = HalData::from_slice(input);
    let out = hal_call!("aes_decrypt", self.link.aes_decrypt(&input, &param, slot))?;
    buffer::adopt(&out)
  }

  pub fn rsa_encrypt(
    &mut self,
    mode: &RsaMode,
    key_id: &str,
    input: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "rsa_encrypt", ?mode, key_id, len = input.len(), "enter");
    let slot = self.slot(key_id)?;
    let mode = translate::rsa_mode_to_hal(mode);
    known(mode.rsa_a != HalRsaAlgorithm::Unknown)?;
    let input = HalData::from_slice(input);
    let out = hal_call!("rsa_encrypt", self.link.rsa_encrypt(&input, &mode, slot))?;
    buffer::adopt(&out)
  }

  pub fn rsa_decrypt(
    &mut self,
    mode: &RsaMode,
    key_id: &str,
    input: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "rsa_decrypt", ?mode, key_id, len = input.len(), "enter");
    let slot = self.slot(key_id)?;
    let mode = translate::rsa_mode_to_hal(mode);
    known(mode.rsa_a != HalRsaAlgorithm::Unknown)?;
    let input = HalData::from_slice(input);
    let out = hal_call!("rsa_decrypt", self.link.rsa_decrypt(&input, &mode, slot))?;
    buffer::adopt(&out)
  }

  // Secure storage. Only offset 0 is supported.

  pub fn read(&mut self, name: &str, offset: u32) -> SecurityResult<DataBuffer> {
    debug!(op = "read_storage", name, offset, "enter");
    known(offset == 0)?;
    let slot = self.slot(name)?;
    let out = hal_call!("read_storage", self.link.read_storage(slot))?;
    buffer::adopt(&out)
  }

  pub fn write(&mut self, name: &str, offset: u32, data: &[u8]) -> SecurityResult<()> {
    debug!(op = "write_storage", name, offset, len = data.len(), "enter");
    known(offset == 0)?;
    let slot = self.slot(name)?;
    hal_call!("write_storage", self.link.write_storage(slot, &HalData::from_slice(data)))
  }

  pub fn delete(&mut self, name: &str) -> SecurityResult<()> {
    debug!(op = "delete_storage", name, "enter");
    let slot = self.slot(name)?;
    hal_call!("delete_storage", self.link.delete_storage(slot))
  }

  /// Not yet backed by the hardware: always 0, not an authoritative size.
  pub fn get_size(&mut self, name: &str) -> SecurityResult<u32> {
    debug!(op = "get_size", name, "enter");
    Ok(0)
  }

  /// Not yet backed by the hardware: always empty, not an authoritative listing.
  pub fn list(&mut self) -> SecurityResult<Vec<String>> {
    debug!(op = "list_storage", "enter");
    Ok(Vec::new())
  }

  // Authentication

  pub fn generate_random(&mut self, size: u32) -> SecurityResult<DataBuffer> {
    debug!(op = "generate_random", size, "enter");
    let out = hal_call!("generate_random", self.link.hal_mut().generate_random(size))?;
    buffer::adopt(&out)
  }

  pub fn get_hash(&mut self, hash: HashType, data: &[u8]) -> SecurityResult<DataBuffer> {
    debug!(op = "get_hash", ?hash, len = data.len(), "enter");
    let hash_type = translate::hash_to_hal(hash);
    known(hash_type != HalHashType::Unknown)?;
    let data = HalData::from_slice(data);
    let out = hal_call!("get_hash", self.link.hal_mut().get_hash(hash_type, &data))?;
    buffer::adopt(&out)
  }

  pub fn get_hmac(
    &mut self,
    algorithm: SecurityAlgorithm,
    key_id: &str,
    data: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "get_hmac", ?algorithm, key_id, len = data.len(), "enter");
    let hmac_type = translate::hmac_to_hal(algorithm);
    known(hmac_type != HalHmacType::Unknown)?;
    let slot = self.slot(key_id)?;
    let out = hal_call!(
      "get_hmac",
      self.link.hal_mut().get_hmac(hmac_type, &HalData::from_slice(data), slot)
    )?;
    buffer::adopt(&out)
  }

  pub fn get_ecdsa_signature(
    &mut self,
    mode: &EcdsaMode,
    key_id: &str,
    hash: &[u8],
  ) -> SecurityResult<DataBuffer> {
    debug!(op = "get_ecdsa_signature", ?mode, key_id, "enter");
    let slot = self.slot(key_id)?;
    let mode = translate::ecdsa_mode_to_hal(mode);
    known(mode.curve != HalEcdsaCurve::Unknown)?;
    let out = hal_call!(
      "ecdsa_sign_md",
      self.link.hal_mut().ecdsa_sign_md(&mode, &HalData::from_slice(hash), slot)
    )?;
    buffer::adopt(&out)
  }

  pub fn verify_ecdsa_signature(
    &mut self,
    mode: &EcdsaMode,
    key_id: &str,
    hash: &[u8],
    signature: &[u8],
  ) -> SecurityResult<()> {
    debug!(op = "verify_ecdsa_signature", ?mode, key_id, "enter");
    let slot = self.slot(key_id)?;
    let mode = translate::ecdsa_mode_to_hal(mode);
    known(mode.curve != HalEcdsaCurve::Unknown)?;
    let hash = HalData::from_slice(hash);
    let signature = HalData::from_slice(signature);
    hal_call!(
      "ecdsa_verify_md",
      self.link.hal_mut().ecdsa_verify_md(&mode, &hash, &signature, slot)
    )
  }

  pub fn get_certificate(&mut self, cert_name: &str) -> SecurityResult<DataBuffer> {
    debug!(op = "get_certificate", cert_name, "enter");
    let slot = self.slot(cert_name)?;
    let out = hal_call!("get_certificate", self.link.hal_mut().get_certificate(slot))?;
    buffer::adopt(&out)
  }

  pub fn generate_certificate(
    &mut self,
    cert_name: &str,
    _csr: &CsrInfo,
  ) -> SecurityResult<DataBuffer> {
    unsupported("generate_certificate", cert_name)
  }

  pub fn set_certificate(&mut self, cert_name: &str, _cert: &[u8]) -> SecurityResult<()> {
    unsupported("set_certificate", cert_name)
  }

  pub fn remove_certificate(&mut self, cert_name: &str) -> SecurityResult<()> {
    unsupported("remove_certificate", cert_name)
  }

  pub fn get_rsa_signature(
    &mut self,
    _mode: &RsaMode,
    key_id: &str,
    _hash: &[u8],
  ) -> SecurityResult<DataBuffer> {
    unsupported("get_rsa_signature", key_id)
  }

  pub fn verify_rsa_signature(
    &mut self,
    _mode: &RsaMode,
    key_id: &str,
    _hash: &[u8],
    _signature: &[u8],
  ) -> SecurityResult<()> {
    unsupported("verify_rsa_signature", key_id)
  }

  pub fn generate_dhparams(&mut self, _params: &DhParams) -> SecurityResult<DataBuffer> {
    unsupported("generate_dhparams", "")
  }

  pub fn set_dhparams(&mut self, _params: &DhParams) -> SecurityResult<DataBuffer> {
    unsupported("set_dhparams", "")
  }

  pub fn compute_dhparams(&mut self, _params: &DhParams) -> SecurityResult<DataBuffer> {
    unsupported("compute_dhparams", "")
  }

  pub fn generate_ecdhkey(&mut self, _params: &EcdhParams) -> SecurityResult<DataBuffer> {
    unsupported("generate_ecdhkey", "")
  }

  pub fn compute_ecdhkey(&mut self, _params: &EcdhParams) -> SecurityResult<DataBuffer> {
    unsupported("compute_ecdhkey", "")
  }
}

/// Unknown descriptors never reach the hardware.
fn key_type(algorithm: SecurityAlgorithm) -> SecurityResult<HalKeyType> {
  match translate::algorithm_to_hal(algorithm) {
    HalKeyType::Unknown => Err(SecurityError::InvalidInputParams),
    key_type => Ok(key_type),
  }
}

fn known(ok: bool) -> SecurityResult<()> {
  if ok {
    Ok(())
  } else {
    Err(SecurityError::InvalidInputParams)
  }
}

fn unsupported<T>(op: &'static str, name: &str) -> SecurityResult<T> {
  debug!(op, name, "enter");
  Err(SecurityError::NotSupported)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hardware_errors_map_onto_the_service_taxonomy() {
    assert_eq!(SecurityError::from(HalError::NotSupported), SecurityError::NotSupported);
    assert_eq!(SecurityError::from(HalError::AllocFail), SecurityError::AllocError);
    assert_eq!(SecurityError::from(HalError::InvalidSlotRange), SecurityError::InvalidKeyIndex);
    assert_eq!(SecurityError::from(HalError::InvalidArgs), SecurityError::InvalidInputParams);
    assert_eq!(
      SecurityError::from(HalError::EmptySlot),
      SecurityError::Hardware { code: HalError::EmptySlot.code() }
    );
  }

  #[test]
  fn status_codes_are_stable() {
    assert_eq!(status_of(&Ok::<(), SecurityError>(())), 0);
    assert_eq!(status_of::<()>(&Err(SecurityError::InvalidKeyIndex)), -4);
    assert_eq!(status_of::<()>(&Err(SecurityError::InvalidInputParams)), -3);
    assert_eq!(status_of::<()>(&Err(SecurityError::AllocError)), -2);
    assert_eq!(status_of::<()>(&Err(SecurityError::NotSupported)), -7);
    assert_eq!(status_of::<()>(&Err(SecurityError::Hardware { code: 9 })), -1);
    assert_eq!(status_of::<()>(&Err(SecurityError::UnknownCommand(1))), -9);
    assert_eq!(status_of::<()>(&Err(SecurityError::Transport(String::new()))), -10);
  }

  #[test]
  fn unknown_algorithm_is_rejected_locally() {
    assert_eq!(key_type(SecurityAlgorithm::Unknown), Err(SecurityError::InvalidInputParams));
    assert_eq!(key_type(SecurityAlgorithm::Aes256), Ok(HalKeyType::Aes256));
  }

  #[test]
  fn unknown_command_message_shows_the_code() {
    assert_eq!(SecurityError::UnknownCommand(0x999).to_string(), "unknown command 0x0999");
  }
}
