//! Return codes reported by the secure element hardware layer.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
  #[error("secure element not initialized")]
  NotInitialized,
  #[error("invalid arguments")]
  InvalidArgs,
  #[error("slot index out of range")]
  InvalidSlotRange,
  #[error("invalid request")]
  InvalidRequest,
  #[error("not supported")]
  NotSupported,
  #[error("bad key")]
  BadKey,
  #[error("slot is empty")]
  EmptySlot,
  #[error("allocation failed")]
  AllocFail,
  #[error("secure element busy")]
  Busy,
  #[error("operation failed: {0}")]
  Fail(String),
}

impl HalError {
  /// Non-zero return code carried across the dispatch boundary. Zero is success.
  pub fn code(&self) -> i32 {
    match self {
      HalError::NotInitialized => 1,
      HalError::InvalidArgs => 2,
      HalError::InvalidSlotRange => 3,
      HalError::InvalidRequest => 4,
      HalError::NotSupported => 5,
      HalError::BadKey => 6,
      HalError::EmptySlot => 7,
      HalError::AllocFail => 8,
      HalError::Busy => 9,
      HalError::Fail(_) => 10,
    }
  }

  /// Rebuilds an error from a return code; `None` for success.
  pub fn from_code(code: i32) -> Option<Self> {
    match code {
      0 => None,
      1 => Some(HalError::NotInitialized),
      2 => Some(HalError::InvalidArgs),
      3 => Some(HalError::InvalidSlotRange),
      4 => Some(HalError::InvalidRequest),
      5 => Some(HalError::NotSupported),
      6 => Some(HalError::BadKey),
      7 => Some(HalError::EmptySlot),
      8 => Some(HalError::AllocFail),
      9 => Some(HalError::Busy),
      other => Some(HalError::Fail(format!("return code {other}"))),
    }
  }
}

pub type HalResult<T> = Result<T, HalError>;

/// Collapses a hardware result into the integer code written back to a request.
pub fn result_code<T>(result: &HalResult<T>) -> i32 {
  match result {
    Ok(_) => 0,
    Err(err) => err.code(),
  }
}
