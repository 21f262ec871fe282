use crate::hal::HalAesMode;
use aes::cipher::block_padding::{Iso7816, NoPadding, Pkcs7, ZeroPadding};
use aes::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use getrandom::getrandom;

pub const AES_BLOCK_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chaining {
  Ecb,
  Cbc,
  Ctr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
  None,
  /// ISO/IEC 9797-1 method 1: zero fill, not removable on decrypt.
  Zero,
  /// ISO/IEC 9797-1 method 2: 0x80 then zero fill.
  Bit,
  Pkcs7,
}

pub fn split_mode(mode: HalAesMode) -> Option<(Chaining, Padding)> {
  let split = match mode {
    HalAesMode::EcbNoPad => (Chaining::Ecb, Padding::None),
    HalAesMode::EcbIso9797M1 => (Chaining::Ecb, Padding::Zero),
    HalAesMode::EcbIso9797M2 => (Chaining::Ecb, Padding::Bit),
    HalAesMode::EcbPkcs5 | HalAesMode::EcbPkcs7 => (Chaining::Ecb, Padding::Pkcs7),
    HalAesMode::CbcNoPad => (Chaining::Cbc, Padding::None),
    HalAesMode::CbcIso9797M1 => (Chaining::Cbc, Padding::Zero),
    HalAesMode::CbcIso9797M2 => (Chaining::Cbc, Padding::Bit),
    HalAesMode::CbcPkcs5 | HalAesMode::CbcPkcs7 => (Chaining::Cbc, Padding::Pkcs7),
    HalAesMode::Ctr => (Chaining::Ctr, Padding::None),
    HalAesMode::Unknown => return None,
  };
  Some(split)
}

pub fn aes_encrypt(
  key: &[u8],
  mode: HalAesMode,
  iv: &[u8],
  input: &[u8],
) -> Result<Vec<u8>, String> {
  let (chaining, padding) = split_mode(mode).ok_or("unsupported aes mode")?;
  if chaining == Chaining::Ctr {
    return ctr_apply(key, iv, input);
  }
  if padding == Padding::None && input.len() % AES_BLOCK_LEN != 0 {
    return Err("input is not block aligned".to_string());
  }
  if chaining == Chaining::Cbc {
    check_iv(iv)?;
  }
  match key.len() {
    16 => encrypt_with::<Aes128>(key, iv, chaining, padding, input),
    24 => encrypt_with::<Aes192>(key, iv, chaining, padding, input),
    32 => encrypt_with::<Aes256>(key, iv, chaining, padding, input),
    _ => Err("invalid key length".to_string()),
  }
}

pub fn aes_decrypt(
  key: &[u8],
  mode: HalAesMode,
  iv: &[u8],
  input: &[u8],
) -> Result<Vec<u8>, String> {
  let (chaining, padding) = split_mode(mode).ok_or("unsupported aes mode")?;
  if chaining == Chaining::Ctr {
    return ctr_apply(key, iv, input);
  }
  if input.len() % AES_BLOCK_LEN != 0 {
    return Err("ciphertext is not block aligned".to_string());
  }
  if chaining == Chaining::Cbc {
    check_iv(iv)?;
  }
  match key.len() {
    16 => decrypt_with::<Aes128>(key, iv, chaining, padding, input),
    24 => decrypt_with::<Aes192>(key, iv, chaining, padding, input),
    32 => decrypt_with::<Aes256>(key, iv, chaining, padding, input),
    _ => Err("invalid key length".to_string()),
  }
}

fn encrypt_with<C>(
  key: &[u8],
  iv: &[u8],
  chaining: Chaining,
  padding: Padding,
  input: &[u8],
) -> Result<Vec<u8>, String>
where
  C: BlockCipher + BlockEncryptMut + KeyInit,
{
  let invalid = |_| "invalid key or iv length".to_string();
  let out = if chaining == Chaining::Cbc {
    seal(cbc::Encryptor::<C>::new_from_slices(key, iv).map_err(invalid)?, padding, input)
  } else {
    seal(ecb::Encryptor::<C>::new_from_slice(key).map_err(invalid)?, padding, input)
  };
  Ok(out)
}

fn decrypt_with<C>(
  key: &[u8],
  iv: &[u8],
  chaining: Chaining,
  padding: Padding,
  input: &[u8],
) -> Result<Vec<u8>, String>
where
  C: BlockCipher + BlockDecryptMut + KeyInit,
{
  let invalid = |_| "invalid key or iv length".to_string();
  if chaining == Chaining::Cbc {
    open(cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(invalid)?, padding, input)
  } else {
    open(ecb::Decryptor::<C>::new_from_slice(key).map_err(invalid)?, padding, input)
  }
}

/// Callers check alignment first when `padding` is `None`.
fn seal<E: BlockEncryptMut>(cipher: E, padding: Padding, input: &[u8]) -> Vec<u8> {
  match padding {
    Padding::None => cipher.encrypt_padded_vec_mut::<NoPadding>(input),
    Padding::Zero => cipher.encrypt_padded_vec_mut::<ZeroPadding>(input),
    Padding::Bit => cipher.encrypt_padded_vec_mut::<Iso7816>(input),
    Padding::Pkcs7 => cipher.encrypt_padded_vec_mut::<Pkcs7>(input),
  }
}

// Zero fill is indistinguishable from trailing zero plaintext, so it stays.
fn open<D: BlockDecryptMut>(cipher: D, padding: Padding, input: &[u8]) -> Result<Vec<u8>, String> {
  match padding {
    Padding::None | Padding::Zero => cipher.decrypt_padded_vec_mut::<NoPadding>(input),
    Padding::Bit => cipher.decrypt_padded_vec_mut::<Iso7816>(input),
    Padding::Pkcs7 => cipher.decrypt_padded_vec_mut::<Pkcs7>(input),
  }
  .map_err(|_| "bad padding".to_string())
}

fn ctr_apply(key: &[u8], iv: &[u8], input: &[u8]) -> Result<Vec<u8>, String> {
  check_iv(iv)?;
  let invalid = |_| "invalid key or iv length".to_string();
  let mut buf = input.to_vec();
  match key.len() {
    16 => ctr::Ctr128BE::<Aes128>::new_from_slices(key, iv)
      .map_err(invalid)?
      .apply_keystream(&mut buf),
    24 => ctr::Ctr128BE::<Aes192>::new_from_slices(key, iv)
      .map_err(invalid)?
      .apply_keystream(&mut buf),
    32 => ctr::Ctr128BE::<Aes256>::new_from_slices(key, iv)
      .map_err(invalid)?
      .apply_keystream(&mut buf),
    _ => return Err("invalid key length".to_string()),
  }
  Ok(buf)
}

fn check_iv(iv: &[u8]) -> Result<(), String> {
  if iv.len() == AES_BLOCK_LEN {
    Ok(())
  } else {
    Err("iv must be 16 bytes".to_string())
  }
}

pub fn random_bytes(len: usize) -> Result<Vec<u8>, String> {
  let mut out = vec![0u8; len];
  getrandom(&mut out).map_err(|_| "getrandom failed".to_string())?;
  Ok(out)
}
