//! Flat, integer-keyed CBOR maps: the dispatch wire format.
//!
//! Encoding is deterministic (ascending keys, shortest integer forms) and
//! decoding accepts nothing else, so one request has exactly one encoding.

use ciborium::value::{Integer, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CborLimits {
  pub max_bytes: usize,
  pub max_entries: usize,
}

impl Default for CborLimits {
  fn default() -> Self {
    Self {
      max_bytes: 1024 * 1024,
      max_entries: 32,
    }
  }
}

/// Map from small unsigned keys to integer or byte-string values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireMap {
  entries: BTreeMap<u64, Value>,
}

impl WireMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put_uint(&mut self, key: u64, value: u64) {
    self.entries.insert(key, Value::Integer(Integer::from(value)));
  }

  pub fn put_int(&mut self, key: u64, value: i64) {
    self.entries.insert(key, Value::Integer(Integer::from(value)));
  }

  pub fn put_bytes(&mut self, key: u64, value: &[u8]) {
    self.entries.insert(key, Value::Bytes(value.to_vec()));
  }

  pub fn encode(&self) -> Result<Vec<u8>, String> {
    let pairs = self
      .entries
      .iter()
      .map(|(key, value)| (Value::Integer(Integer::from(*key)), value.clone()))
      .collect();
    let mut out = Vec::new();
    ciborium::ser::into_writer(&Value::Map(pairs), &mut out).map_err(|e| e.to_string())?;
    Ok(out)
  }

  pub fn decode(bytes: &[u8], limits: &CborLimits) -> Result<Self, String> {
    if bytes.len() > limits.max_bytes {
      return Err(format!("wire message exceeds {} bytes", limits.max_bytes));
    }
    let value: Value = ciborium::de::from_reader(bytes).map_err(|e| e.to_string())?;
    let Value::Map(pairs) = value else {
      return Err("wire message is not a map".to_string());
    };
    if pairs.len() > limits.max_entries {
      return Err(format!("wire message has more than {} entries", limits.max_entries));
    }

    let mut entries = BTreeMap::new();
    let mut previous: Option<u64> = None;
    for (key, value) in pairs {
      let key = match key {
        Value::Integer(int) => u64::try_from(int).map_err(|_| "negative map key".to_string())?,
        _ => return Err("map key is not an integer".to_string()),
      };
      if matches!(previous, Some(prev) if prev >= key) {
        return Err(format!("map key {key} is out of order or repeated"));
      }
      previous = Some(key);
      if !matches!(value, Value::Integer(_) | Value::Bytes(_)) {
        return Err(format!("unsupported value at key {key}"));
      }
      entries.insert(key, value);
    }

    let map = Self { entries };
    if map.encode()? != bytes {
      return Err("non-canonical cbor".to_string());
    }
    Ok(map)
  }

  pub fn uint(&self, key: u64) -> Result<u64, String> {
    self.opt_uint(key)?.ok_or_else(|| format!("missing key {key}"))
  }

  pub fn opt_uint(&self, key: u64) -> Result<Option<u64>, String> {
    match self.entries.get(&key) {
      None => Ok(None),
      Some(Value::Integer(int)) => u64::try_from(*int)
        .map(Some)
        .map_err(|_| format!("key {key} is negative")),
      Some(_) => Err(format!("key {key} is not an integer")),
    }
  }

  pub fn int(&self, key: u64) -> Result<i64, String> {
    match self.entries.get(&key) {
      None => Err(format!("missing key {key}")),
      Some(Value::Integer(int)) => {
        i64::try_from(*int).map_err(|_| format!("key {key} overflows i64"))
      }
      Some(_) => Err(format!("key {key} is not an integer")),
    }
  }

  pub fn bytes(&self, key: u64) -> Result<Vec<u8>, String> {
    self.opt_bytes(key)?.ok_or_else(|| format!("missing key {key}"))
  }

  pub fn opt_bytes(&self, key: u64) -> Result<Option<Vec<u8>>, String> {
    match self.entries.get(&key) {
      None => Ok(None),
      Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
      Some(_) => Err(format!("key {key} is not a byte string")),
    }
  }
}
