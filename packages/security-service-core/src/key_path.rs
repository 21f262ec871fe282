//! Resolution of opaque key identifiers to secure element slots.

use crate::security_service::{SecurityError, SecurityResult};
use crate::types::SlotIndex;

pub const SECURE_ELEMENT_PREFIX: &str = "ss/";

/// What to do with identifiers outside the secure element namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UnknownNamespace {
  /// Resolve to slot 0. Reserved for future non-secure-element key stores.
  #[default]
  SlotZero,
  Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPathPolicy {
  pub secure_element_prefix: String,
  pub unknown_namespace: UnknownNamespace,
}

impl Default for KeyPathPolicy {
  fn default() -> Self {
    Self {
      secure_element_prefix: SECURE_ELEMENT_PREFIX.to_string(),
      unknown_namespace: UnknownNamespace::default(),
    }
  }
}

/// Resolves with the default policy.
pub fn resolve(identifier: &str) -> SecurityResult<SlotIndex> {
  resolve_with(&KeyPathPolicy::default(), identifier)
}

pub fn resolve_with(policy: &KeyPathPolicy, identifier: &str) -> SecurityResult<SlotIndex> {
  match identifier.strip_prefix(policy.secure_element_prefix.as_str()) {
    Some(suffix) => parse_slot(suffix).ok_or(SecurityError::InvalidKeyIndex),
    // TODO: route these to a non-secure-element key store once one exists.
    None => match policy.unknown_namespace {
      UnknownNamespace::SlotZero => Ok(SlotIndex(0)),
      UnknownNamespace::Reject => Err(SecurityError::InvalidKeyIndex),
    },
  }
}

fn parse_slot(suffix: &str) -> Option<SlotIndex> {
  if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  suffix.parse::<u32>().ok().map(SlotIndex)
}
