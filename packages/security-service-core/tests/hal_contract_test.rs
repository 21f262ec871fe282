use security_service_core::adapters::SecureElementHal;
use security_service_core::error::{HalError, HalResult};
use security_service_core::hal::{
  HalAesMode, HalAesParam, HalData, HalEcdsaMode, HalHashType, HalHmacType, HalKeyType, HalRsaMode,
};
use security_service_core::key_path::{KeyPathPolicy, UnknownNamespace};
use security_service_core::link::LinkMode;
use security_service_core::security_service::{SecurityConfig, SecurityContext, SecurityError};
use security_service_core::soft_se::SoftSecureElement;
use security_service_core::types::{
  AesMode, AesParam, HashType, RsaAlgorithm, RsaMode, SecurityAlgorithm, SlotIndex,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Hardware double that records every call and answers from a script.
#[derive(Default)]
struct ScriptedHal {
  calls: Rc<RefCell<Vec<String>>>,
  reply: HalData,
  failure: Option<HalError>,
}

impl ScriptedHal {
  fn answer(&self, call: String) -> HalResult<HalData> {
    self.calls.borrow_mut().push(call);
    match &self.failure {
      Some(err) => Err(err.clone()),
      None => Ok(self.reply.clone()),
    }
  }

  fn ack(&self, call: String) -> HalResult<()> {
    self.answer(call).map(|_| ())
  }
}

impl SecureElementHal for ScriptedHal {
  fn init(&mut self) -> HalResult<()> {
    self.calls.borrow_mut().push("init".to_string());
    Ok(())
  }

  fn deinit(&mut self) -> HalResult<()> {
    self.calls.borrow_mut().push("deinit".to_string());
    Ok(())
  }

  fn generate_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
    self.ack(format!("generate_key {key_type:?} {slot}"))
  }

  fn set_key(
    &mut self,
    key_type: HalKeyType,
    slot: SlotIndex,
    public: &HalData,
    private: &HalData,
  ) -> HalResult<()> {
    self.ack(format!(
      "set_key {key_type:?} {slot} {} {}",
      public.data_len(),
      private.data_len()
    ))
  }

  fn get_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<HalData> {
    self.answer(format!("get_key {key_type:?} {slot}"))
  }

  fn remove_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
    self.ack(format!("remove_key {key_type:?} {slot}"))
  }

  fn aes_encrypt(
    &mut self,
    input: &HalData,
    param: &HalAesParam,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("aes_encrypt {:?} {slot} {}", param.mode, input.data_len()))
  }

  fn aes_decrypt(
    &mut self,
    input: &HalData,
    param: &HalAesParam,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("aes_decrypt {:?} {slot} {}", param.mode, input.data_len()))
  }

  fn rsa_encrypt(
    &mut self,
    _input: &HalData,
    mode: &HalRsaMode,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("rsa_encrypt {:?} {slot}", mode.rsa_a))
  }

  fn rsa_decrypt(
    &mut self,
    _input: &HalData,
    mode: &HalRsaMode,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("rsa_decrypt {:?} {slot}", mode.rsa_a))
  }

  fn ecdsa_sign_md(
    &mut self,
    mode: &HalEcdsaMode,
    _hash: &HalData,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("ecdsa_sign_md {:?} {slot}", mode.curve))
  }

  fn ecdsa_verify_md(
    &mut self,
    mode: &HalEcdsaMode,
    _hash: &HalData,
    _signature: &HalData,
    slot: SlotIndex,
  ) -> HalResult<()> {
    self.ack(format!("ecdsa_verify_md {:?} {slot}", mode.curve))
  }

  fn write_storage(&mut self, slot: SlotIndex, data: &HalData) -> HalResult<()> {
    self.ack(format!("write_storage {slot} {}", data.data_len()))
  }

  fn read_storage(&mut self, slot: SlotIndex) -> HalResult<HalData> {
    self.answer(format!("read_storage {slot}"))
  }

  fn delete_storage(&mut self, slot: SlotIndex) -> HalResult<()> {
    self.ack(format!("delete_storage {slot}"))
  }

  fn generate_random(&mut self, len: u32) -> HalResult<HalData> {
    self.answer(format!("generate_random {len}"))
  }

  fn get_hash(&mut self, hash_type: HalHashType, _input: &HalData) -> HalResult<HalData> {
    self.answer(format!("get_hash {hash_type:?}"))
  }

  fn get_hmac(
    &mut self,
    hmac_type: HalHmacType,
    _input: &HalData,
    slot: SlotIndex,
  ) -> HalResult<HalData> {
    self.answer(format!("get_hmac {hmac_type:?} {slot}"))
  }

  fn get_certificate(&mut self, slot: SlotIndex) -> HalResult<HalData> {
    self.answer(format!("get_certificate {slot}"))
  }
}

fn scripted(reply: HalData) -> (SecurityContext<ScriptedHal>, Rc<RefCell<Vec<String>>>) {
  let calls = Rc::new(RefCell::new(Vec::new()));
  let hal = ScriptedHal {
    calls: calls.clone(),
    reply,
    failure: None,
  };
  let ctx = SecurityContext::init(hal, SecurityConfig::default()).expect("init");
  (ctx, calls)
}

#[test]
fn each_operation_makes_one_translated_hardware_call() {
  let (mut ctx, calls) = scripted(HalData::from_slice(&[0u8; 16]));
  ctx.generate_key(SecurityAlgorithm::EccSecP521r1, "ss/3").expect("generate");
  ctx
    .aes_encrypt(&AesParam::new(AesMode::CbcIso9797M1), "ss/3", &[1u8; 5])
    .expect("encrypt");
  ctx.get_hmac(SecurityAlgorithm::HmacSha384, "ss/4", b"m").expect("hmac");
  ctx.get_hash(HashType::Sha224, b"m").expect("hash");

  assert_eq!(
    *calls.borrow(),
    vec![
      "init".to_string(),
      "generate_key EccSecP521r1 slot#3".to_string(),
      "aes_encrypt CbcIso9797M1 slot#3 5".to_string(),
      "get_hmac Sha384 slot#4".to_string(),
      "get_hash Sha224".to_string(),
    ]
  );
}

#[test]
fn output_buffers_take_the_hardware_reported_length() {
  for len in [0usize, 1, 31, 256] {
    let (mut ctx, _) = scripted(HalData::new(vec![0x5a; len]));
    let out = ctx.generate_random(999).expect("random");
    assert_eq!(out.len(), len);
    let out = ctx.read("ss/1", 0).expect("read");
    assert_eq!(out.len(), len);
    assert_eq!(out.release(), len);
  }
}

#[test]
fn second_key_component_only_when_the_hardware_returns_one() {
  let (mut ctx, _) = scripted(HalData::from_slice(&[1u8; 32]));
  let key = ctx.get_key(SecurityAlgorithm::EccSecP256r1, "ss/1").expect("x only");
  assert_eq!(key.x.len(), 32);
  assert!(key.y.is_none());

  let (mut ctx, _) = scripted(HalData::with_priv(vec![1u8; 48], vec![2u8; 48]));
  let key = ctx.get_key(SecurityAlgorithm::EccSecP384r1, "ss/1").expect("x and y");
  assert_eq!(key.x.as_slice(), &[1u8; 48][..]);
  assert_eq!(key.y.expect("y").as_slice(), &[2u8; 48][..]);
}

#[test]
fn hardware_failures_are_returned_not_swallowed() {
  let calls = Rc::new(RefCell::new(Vec::new()));
  let hal = ScriptedHal {
    calls: calls.clone(),
    reply: HalData::default(),
    failure: Some(HalError::NotSupported),
  };
  let mut ctx = SecurityContext::init(hal, SecurityConfig::default()).expect("init");
  assert_eq!(
    ctx.generate_key(SecurityAlgorithm::Dh2048, "ss/1"),
    Err(SecurityError::NotSupported)
  );
  assert_eq!(calls.borrow().len(), 2);
}

#[test]
fn unknown_descriptors_never_reach_the_hardware() {
  let (mut ctx, calls) = scripted(HalData::default());
  assert_eq!(
    ctx.generate_key(SecurityAlgorithm::Unknown, "ss/1"),
    Err(SecurityError::InvalidInputParams)
  );
  assert_eq!(
    ctx.aes_encrypt(&AesParam::new(AesMode::Unknown), "ss/1", &[0u8; 16]).map(|b| b.len()),
    Err(SecurityError::InvalidInputParams)
  );
  assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn strict_key_path_policy_rejects_foreign_namespaces() {
  let config = SecurityConfig {
    key_paths: KeyPathPolicy {
      unknown_namespace: UnknownNamespace::Reject,
      ..KeyPathPolicy::default()
    },
    ..SecurityConfig::default()
  };
  let mut ctx = SecurityContext::init(ScriptedHal::default(), config).expect("init");
  assert_eq!(
    ctx.remove_key(SecurityAlgorithm::Aes128, "tmp/key"),
    Err(SecurityError::InvalidKeyIndex)
  );
  ctx.remove_key(SecurityAlgorithm::Aes128, "ss/2").expect("secure element path");
}

#[test]
fn dispatched_link_matches_direct_results() {
  let config = SecurityConfig {
    link: LinkMode::Dispatched,
    ..SecurityConfig::default()
  };
  let hal: Box<dyn SecureElementHal> = Box::new(SoftSecureElement::default());
  let mut ctx = SecurityContext::init(hal, config).expect("init");
  ctx.generate_key(SecurityAlgorithm::Aes128, "ss/1").expect("generate");

  let param = AesParam::with_iv(AesMode::Ctr, &[9u8; 16]);
  let cipher = ctx.aes_encrypt(&param, "ss/1", b"dispatched").expect("encrypt");
  assert_eq!(cipher.len(), 10);
  let plain = ctx.aes_decrypt(&param, "ss/1", cipher.as_slice()).expect("decrypt");
  assert_eq!(plain.as_slice(), b"dispatched");

  ctx.generate_key(SecurityAlgorithm::Rsa1024, "ss/3").expect("generate rsa");
  let mode = RsaMode {
    rsa_a: RsaAlgorithm::RsassaPkcs1V15,
    hash: HashType::Sha256,
    mgf: HashType::Sha256,
    salt_byte_len: 0,
  };
  let wrapped = ctx.rsa_encrypt(&mode, "ss/3", b"session key").expect("rsa encrypt");
  assert_eq!(wrapped.len(), 128);
  let unwrapped = ctx.rsa_decrypt(&mode, "ss/3", wrapped.as_slice()).expect("rsa decrypt");
  assert_eq!(unwrapped.as_slice(), b"session key");

  ctx.write("ss/2", 0, b"kept").expect("write");
  assert_eq!(ctx.read("ss/2", 0).expect("read").as_slice(), b"kept");
  ctx.delete("ss/2").expect("delete");
  assert!(ctx.delete("ss/2").is_err());

  // Non-boundary operations still reach the hardware directly.
  assert_eq!(ctx.generate_random(12).expect("random").len(), 12);
  assert_eq!(ctx.config().link, LinkMode::Dispatched);
}

#[test]
fn dispatched_link_accepts_what_the_direct_link_accepts() {
  let input = vec![0x3c; 600 * 1024];
  let param = AesParam::with_iv(AesMode::Ctr, &[1u8; 16]);
  let mut lens = Vec::new();
  for link in [LinkMode::Direct, LinkMode::Dispatched] {
    let config = SecurityConfig {
      link,
      ..SecurityConfig::default()
    };
    let mut ctx = SecurityContext::init(SoftSecureElement::default(), config).expect("init");
    ctx.generate_key(SecurityAlgorithm::Aes256, "ss/1").expect("generate");
    let cipher = ctx.aes_encrypt(&param, "ss/1", &input).expect("encrypt");
    let plain = ctx.aes_decrypt(&param, "ss/1", cipher.as_slice()).expect("decrypt");
    assert_eq!(plain.as_slice(), &input[..]);
    lens.push(cipher.len());
  }
  assert_eq!(lens, vec![600 * 1024, 600 * 1024]);
}

#[test]
fn cbc_mode_requires_a_full_iv_at_the_hardware() {
  let mut hal = SoftSecureElement::default();
  hal.init().expect("init");
  hal.generate_key(HalKeyType::Aes128, SlotIndex(0)).expect("key");
  let param = HalAesParam {
    mode: HalAesMode::CbcNoPad,
    iv: vec![0u8; 4],
  };
  assert_eq!(
    hal.aes_encrypt(&HalData::from_slice(&[0u8; 16]), &param, SlotIndex(0)),
    Err(HalError::InvalidArgs)
  );
}
