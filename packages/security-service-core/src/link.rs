//! Routing of the boundary commands: straight to the hardware, or through an
//! encoded request handled by the [`Dispatcher`].

use crate::adapters::SecureElementHal;
use crate::cbor::CborLimits;
use crate::dispatcher::{CommandCode, CryptoInfo, Dispatcher, Request, RequestInfo, StorageInfo};
use crate::hal::{HalAesParam, HalData, HalRsaMode};
use crate::security_service::{SecurityError, SecurityResult};
use crate::types::SlotIndex;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkMode {
  /// Same-process hardware calls.
  #[default]
  Direct,
  /// Every boundary command is encoded and handed to the dispatcher.
  Dispatched,
}

pub struct SecureLink<H: SecureElementHal> {
  dispatcher: Dispatcher<H>,
  mode: LinkMode,
}

impl<H: SecureElementHal> SecureLink<H> {
  pub fn new(hal: H, mode: LinkMode, limits: CborLimits) -> Self {
    Self {
      dispatcher: Dispatcher::new(hal, limits),
      mode,
    }
  }

  pub fn hal(&self) -> &H {
    self.dispatcher.hal()
  }

  pub fn hal_mut(&mut self) -> &mut H {
    self.dispatcher.hal_mut()
  }

  pub fn into_hal(self) -> H {
    self.dispatcher.into_inner()
  }

  pub fn aes_encrypt(
    &mut self,
    input: &HalData,
    param: &HalAesParam,
    slot: SlotIndex,
  ) -> SecurityResult<HalData> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().aes_encrypt(input, param, slot)?),
      LinkMode::Dispatched => {
        self.crypto(CommandCode::AesEncrypt, slot, input, Some(param.clone()), None)
      }
    }
  }

  pub fn aes_decrypt(
    &mut self,
    input: &HalData,
    param: &HalAesParam,
    slot: SlotIndex,
  ) -> SecurityResult<HalData> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().aes_decrypt(input, param, slot)?),
      LinkMode::Dispatched => {
        self.crypto(CommandCode::AesDecrypt, slot, input, Some(param.clone()), None)
      }
    }
  }

  pub fn rsa_encrypt(
    &mut self,
    input: &HalData,
    mode: &HalRsaMode,
    slot: SlotIndex,
  ) -> SecurityResult<HalData> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().rsa_encrypt(input, mode, slot)?),
      LinkMode::Dispatched => self.crypto(CommandCode::RsaEncrypt, slot, input, None, Some(*mode)),
    }
  }

  pub fn rsa_decrypt(
    &mut self,
    input: &HalData,
    mode: &HalRsaMode,
    slot: SlotIndex,
  ) -> SecurityResult<HalData> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().rsa_decrypt(input, mode, slot)?),
      LinkMode::Dispatched => self.crypto(CommandCode::RsaDecrypt, slot, input, None, Some(*mode)),
    }
  }

  pub fn write_storage(&mut self, slot: SlotIndex, data: &HalData) -> SecurityResult<()> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().write_storage(slot, data)?),
      LinkMode::Dispatched => self
        .storage(CommandCode::WriteStorage, slot, data.clone())
        .map(|_| ()),
    }
  }

  pub fn read_storage(&mut self, slot: SlotIndex) -> SecurityResult<HalData> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().read_storage(slot)?),
      LinkMode::Dispatched => self.storage(CommandCode::ReadStorage, slot, HalData::default()),
    }
  }

  pub fn delete_storage(&mut self, slot: SlotIndex) -> SecurityResult<()> {
    match self.mode {
      LinkMode::Direct => Ok(self.hal_mut().delete_storage(slot)?),
      LinkMode::Dispatched => self
        .storage(CommandCode::DeleteStorage, slot, HalData::default())
        .map(|_| ()),
    }
  }

  fn crypto(
    &mut self,
    command: CommandCode,
    slot: SlotIndex,
    input: &HalData,
    aes_param: Option<HalAesParam>,
    rsa_mode: Option<HalRsaMode>,
  ) -> SecurityResult<HalData> {
    let req = Request::crypto(CryptoInfo {
      key_idx: slot,
      input: input.clone(),
      aes_param,
      rsa_mode,
      output: HalData::default(),
    });
    match self.round_trip(command, &req)?.info {
      RequestInfo::Crypto(info) => Ok(info.output),
      RequestInfo::Storage(_) => Err(changed_kind()),
    }
  }

  fn storage(
    &mut self,
    command: CommandCode,
    slot: SlotIndex,
    data: HalData,
  ) -> SecurityResult<HalData> {
    let req = Request::storage(StorageInfo { key_idx: slot, data });
    match self.round_trip(command, &req)?.info {
      RequestInfo::Storage(info) => Ok(info.data),
      RequestInfo::Crypto(_) => Err(changed_kind()),
    }
  }

  fn round_trip(&mut self, command: CommandCode, req: &Request) -> SecurityResult<Request> {
    let bytes = req.encode().map_err(SecurityError::Transport)?;
    trace!(?command, request_len = bytes.len(), "crossing dispatch boundary");
    let reply = self.dispatcher.handle_encoded(command.code(), &bytes)?;
    let reply =
      Request::decode(&reply, self.dispatcher.limits()).map_err(SecurityError::Transport)?;
    reply.hal_result()?;
    Ok(reply)
  }
}

fn changed_kind() -> SecurityError {
  SecurityError::Transport("reply changed payload kind".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HalError;
  use crate::hal::{HalAesMode, HalKeyType};
  use crate::soft_se::SoftSecureElement;

  fn link(mode: LinkMode) -> SecureLink<SoftSecureElement> {
    let mut hal = SoftSecureElement::default();
    hal.init().unwrap();
    hal.generate_key(HalKeyType::Aes256, SlotIndex(1)).unwrap();
    SecureLink::new(hal, mode, CborLimits::default())
  }

  #[test]
  fn both_modes_agree_on_aes() {
    let param = HalAesParam {
      mode: HalAesMode::CbcPkcs7,
      iv: vec![3u8; 16],
    };
    let input = HalData::from_slice(b"boundary payload");
    let mut direct = link(LinkMode::Direct);
    let ct = direct.aes_encrypt(&input, &param, SlotIndex(1)).unwrap();

    // Same key material on the dispatched side.
    let mut dispatched =
      SecureLink::new(direct.into_hal(), LinkMode::Dispatched, CborLimits::default());
    let pt = dispatched.aes_decrypt(&ct, &param, SlotIndex(1)).unwrap();
    assert_eq!(pt.data, b"boundary payload".to_vec());
  }

  #[test]
  fn large_inputs_fit_both_ways_across_the_boundary() {
    let param = HalAesParam {
      mode: HalAesMode::Ctr,
      iv: vec![5u8; 16],
    };
    let input = HalData::new(vec![0xa5; 600 * 1024]);
    let mut direct = link(LinkMode::Direct);
    let expected = direct.aes_encrypt(&input, &param, SlotIndex(1)).unwrap();

    let mut dispatched =
      SecureLink::new(direct.into_hal(), LinkMode::Dispatched, CborLimits::default());
    let cipher = dispatched.aes_encrypt(&input, &param, SlotIndex(1)).unwrap();
    assert_eq!(cipher, expected);
    let plain = dispatched.aes_decrypt(&cipher, &param, SlotIndex(1)).unwrap();
    assert_eq!(plain.data_len(), 600 * 1024);
  }

  #[test]
  fn dispatched_storage_round_trip() {
    let mut link = link(LinkMode::Dispatched);
    link.write_storage(SlotIndex(6), &HalData::from_slice(b"note")).unwrap();
    assert_eq!(link.read_storage(SlotIndex(6)).unwrap().data, b"note".to_vec());
    link.delete_storage(SlotIndex(6)).unwrap();
    assert_eq!(
      link.read_storage(SlotIndex(6)),
      Err(SecurityError::from(HalError::EmptySlot))
    );
  }

  #[test]
  fn dispatched_mode_reports_hardware_codes() {
    let mut link = link(LinkMode::Dispatched);
    let param = HalAesParam {
      mode: HalAesMode::EcbNoPad,
      iv: Vec::new(),
    };
    let err = link
      .aes_encrypt(&HalData::from_slice(&[0u8; 16]), &param, SlotIndex(9))
      .unwrap_err();
    assert_eq!(err, SecurityError::Hardware { code: HalError::EmptySlot.code() });
  }
}
