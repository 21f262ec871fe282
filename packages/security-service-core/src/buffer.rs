//! Ownership transfer of hardware output into caller-owned buffers.
//!
//! Every output the facade returns is a freshly allocated [`DataBuffer`] sized
//! from the hardware response. The caller owns it; releasing consumes it, so a
//! second release does not compile:
//!
//! ```compile_fail
//! use security_service_core::buffer::DataBuffer;
//!
//! let buf = DataBuffer::from(vec![1u8, 2, 3]);
//! buf.release();
//! buf.release();
//! ```
//!
//! Nor can a buffer be duplicated into a second owner:
//!
//! ```compile_fail
//! use security_service_core::buffer::DataBuffer;
//!
//! let buf = DataBuffer::from(vec![1u8, 2, 3]);
//! let copy = buf.clone();
//! ```

use crate::hal::HalData;
use crate::security_service::{SecurityError, SecurityResult};
use std::fmt;
use zeroize::Zeroize;

/// Uniquely owned byte buffer, wiped when dropped.
#[derive(PartialEq, Eq)]
pub struct DataBuffer {
  bytes: Vec<u8>,
}

impl DataBuffer {
  /// Allocates exactly `src.len()` bytes and copies `src` into them.
  pub fn copy_from(src: &[u8]) -> SecurityResult<Self> {
    let mut bytes = Vec::new();
    bytes
      .try_reserve_exact(src.len())
      .map_err(|_| SecurityError::AllocError)?;
    bytes.extend_from_slice(src);
    Ok(Self { bytes })
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_vec(mut self) -> Vec<u8> {
    std::mem::take(&mut self.bytes)
  }

  /// Wipes and frees the buffer, returning how many bytes it held.
  pub fn release(self) -> usize {
    self.len()
  }
}

impl Drop for DataBuffer {
  fn drop(&mut self) {
    self.bytes.zeroize();
  }
}

impl From<Vec<u8>> for DataBuffer {
  fn from(bytes: Vec<u8>) -> Self {
    Self { bytes }
  }
}

impl AsRef<[u8]> for DataBuffer {
  fn as_ref(&self) -> &[u8] {
    &self.bytes
  }
}

impl PartialEq<[u8]> for DataBuffer {
  fn eq(&self, other: &[u8]) -> bool {
    self.bytes == other
  }
}

impl fmt::Debug for DataBuffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DataBuffer")
      .field("len", &self.bytes.len())
      .field("bytes", &"<redacted>")
      .finish()
  }
}

/// Takes ownership of the primary field of a hardware response.
pub fn adopt(hal: &HalData) -> SecurityResult<DataBuffer> {
  DataBuffer::copy_from(&hal.data)
}

/// Takes ownership of the auxiliary field of a hardware response.
pub fn adopt_secondary(hal: &HalData) -> SecurityResult<DataBuffer> {
  DataBuffer::copy_from(&hal.priv_data)
}
