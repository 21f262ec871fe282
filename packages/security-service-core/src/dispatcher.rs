//! Command dispatch across the privilege boundary.
//!
//! A request carries one command code plus a typed payload. The responder runs
//! exactly one hardware call for the command and writes the hardware return
//! code into the request. Requests travel as canonical CBOR when encoded.

use crate::adapters::SecureElementHal;
use crate::cbor::{CborLimits, WireMap};
use crate::error::{HalError, HalResult};
use crate::hal::{HalAesMode, HalAesParam, HalData, HalHashType, HalRsaAlgorithm, HalRsaMode};
use crate::security_service::{SecurityError, SecurityResult};
use crate::types::SlotIndex;
use tracing::{debug, warn};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CommandCode {
    AesEncrypt,
    AesDecrypt,
    RsaEncrypt,
    RsaDecrypt,
    WriteStorage,
    ReadStorage,
    DeleteStorage,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CommandGroup {
    Crypto,
    Storage,
}

impl CommandCode {
    pub const ALL: [CommandCode; 7] = [
        CommandCode::AesEncrypt,
        CommandCode::AesDecrypt,
        CommandCode::RsaEncrypt,
        CommandCode::RsaDecrypt,
        CommandCode::WriteStorage,
        CommandCode::ReadStorage,
        CommandCode::DeleteStorage,
    ];

    pub const fn code(self) -> u32 {
        match self {
            CommandCode::AesEncrypt => 0x0301,
            CommandCode::AesDecrypt => 0x0302,
            CommandCode::RsaEncrypt => 0x0303,
            CommandCode::RsaDecrypt => 0x0304,
            CommandCode::WriteStorage => 0x0401,
            CommandCode::ReadStorage => 0x0402,
            CommandCode::DeleteStorage => 0x0403,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|cmd| cmd.code() == code)
    }

    pub fn group(self) -> CommandGroup {
        match self {
            CommandCode::AesEncrypt
            | CommandCode::AesDecrypt
            | CommandCode::RsaEncrypt
            | CommandCode::RsaDecrypt => CommandGroup::Crypto,
            CommandCode::WriteStorage | CommandCode::ReadStorage | CommandCode::DeleteStorage => {
                CommandGroup::Storage
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoInfo {
    pub key_idx: SlotIndex,
    pub input: HalData,
    pub aes_param: Option<HalAesParam>,
    pub rsa_mode: Option<HalRsaMode>,
    pub output: HalData,
}

/// `data` is the input of a write and the output of a read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageInfo {
    pub key_idx: SlotIndex,
    pub data: HalData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestInfo {
    Crypto(CryptoInfo),
    Storage(StorageInfo),
}

/// One in-flight command. `res` holds the hardware return code once handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub info: RequestInfo,
    pub res: i32,
}

impl Request {
    pub fn crypto(info: CryptoInfo) -> Self {
        Self {
            info: RequestInfo::Crypto(info),
            res: 0,
        }
    }

    pub fn storage(info: StorageInfo) -> Self {
        Self {
            info: RequestInfo::Storage(info),
            res: 0,
        }
    }

    /// The hardware outcome recorded by the responder.
    pub fn hal_result(&self) -> HalResult<()> {
        match HalError::from_code(self.res) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Clears whatever `command` consumed, leaving the reply fields.
    pub fn drop_inputs(&mut self, command: CommandCode) {
        match &mut self.info {
            RequestInfo::Crypto(info) => info.input = HalData::default(),
            RequestInfo::Storage(info) if command == CommandCode::WriteStorage => {
                info.data = HalData::default()
            }
            RequestInfo::Storage(_) => {}
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let mut map = WireMap::new();
        map.put_int(12, i64::from(self.res));
        match &self.info {
            RequestInfo::Crypto(info) => {
                map.put_uint(0, 0);
                map.put_uint(1, u64::from(info.key_idx.0));
                map.put_bytes(2, &info.input.data);
                map.put_bytes(3, &info.input.priv_data);
                if let Some(param) = &info.aes_param {
                    map.put_uint(4, aes_mode_code(param.mode));
                    map.put_bytes(5, &param.iv);
                }
                if let Some(mode) = &info.rsa_mode {
                    map.put_uint(6, rsa_algorithm_code(mode.rsa_a));
                    map.put_uint(7, hash_code(mode.hash));
                    map.put_uint(8, hash_code(mode.mgf));
                    map.put_uint(9, u64::from(mode.salt_byte_len));
                }
                map.put_bytes(10, &info.output.data);
                map.put_bytes(11, &info.output.priv_data);
            }
            RequestInfo::Storage(info) => {
                map.put_uint(0, 1);
                map.put_uint(1, u64::from(info.key_idx.0));
                map.put_bytes(2, &info.data.data);
                map.put_bytes(3, &info.data.priv_data);
            }
        }
        map.encode()
    }

    pub fn decode(bytes: &[u8], limits: &CborLimits) -> Result<Self, String> {
        let map = WireMap::decode(bytes, limits)?;
        let res = i32::try_from(map.int(12)?).map_err(|_| "result code out of range")?;
        let key_idx = u32::try_from(map.uint(1)?)
            .map(SlotIndex)
            .map_err(|_| "slot index out of range")?;
        let first = HalData::with_priv(map.bytes(2)?, map.bytes(3)?);
        let info = match map.uint(0)? {
            0 => {
                let aes_param = match map.opt_uint(4)? {
                    Some(mode) => Some(HalAesParam {
                        mode: aes_mode_from_code(mode),
                        iv: map.opt_bytes(5)?.unwrap_or_default(),
                    }),
                    None => None,
                };
                let rsa_mode = match map.opt_uint(6)? {
                    Some(rsa_a) => Some(HalRsaMode {
                        rsa_a: rsa_algorithm_from_code(rsa_a),
                        hash: hash_from_code(map.uint(7)?),
                        mgf: hash_from_code(map.uint(8)?),
                        salt_byte_len: u32::try_from(map.uint(9)?)
                            .map_err(|_| "salt length out of range")?,
                    }),
                    None => None,
                };
                RequestInfo::Crypto(CryptoInfo {
                    key_idx,
                    input: first,
                    aes_param,
                    rsa_mode,
                    output: HalData::with_priv(map.bytes(10)?, map.bytes(11)?),
                })
            }
            1 => RequestInfo::Storage(StorageInfo {
                key_idx,
                data: first,
            }),
            other => return Err(format!("unknown request kind {other}")),
        };
        Ok(Self { info, res })
    }
}

/// Responder side of the boundary. Owns the hardware handle.
pub struct Dispatcher<H: SecureElementHal> {
    hal: H,
    limits: CborLimits,
}

impl<H: SecureElementHal> Dispatcher<H> {
    pub fn new(hal: H, limits: CborLimits) -> Self {
        Self { hal, limits }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn into_inner(self) -> H {
        self.hal
    }

    pub fn limits(&self) -> &CborLimits {
        &self.limits
    }

    /// Runs the single hardware call named by `cmd` and records its return code
    /// in `req.res`. `Err` means the request was never executed.
    pub fn handle(&mut self, cmd: u32, req: &mut Request) -> SecurityResult<()> {
        let Some(command) = CommandCode::from_code(cmd) else {
            warn!(cmd, "unknown dispatch command");
            return Err(SecurityError::UnknownCommand(cmd));
        };
        debug!(?command, "dispatch");

        let hal = &mut self.hal;
        match (command, &mut req.info) {
            (CommandCode::AesEncrypt, RequestInfo::Crypto(info)) => {
                req.res = match &info.aes_param {
                    Some(param) => complete(
                        hal.aes_encrypt(&info.input, param, info.key_idx),
                        &mut info.output,
                    ),
                    None => HalError::InvalidArgs.code(),
                };
            }
            (CommandCode::AesDecrypt, RequestInfo::Crypto(info)) => {
                req.res = match &info.aes_param {
                    Some(param) => complete(
                        hal.aes_decrypt(&info.input, param, info.key_idx),
                        &mut info.output,
                    ),
                    None => HalError::InvalidArgs.code(),
                };
            }
            (CommandCode::RsaEncrypt, RequestInfo::Crypto(info)) => {
                req.res = match &info.rsa_mode {
                    Some(mode) => {
                        complete(hal.rsa_encrypt(&info.input, mode, info.key_idx), &mut info.output)
                    }
                    None => HalError::InvalidArgs.code(),
                };
            }
            (CommandCode::RsaDecrypt, RequestInfo::Crypto(info)) => {
                req.res = match &info.rsa_mode {
                    Some(mode) => {
                        complete(hal.rsa_decrypt(&info.input, mode, info.key_idx), &mut info.output)
                    }
                    None => HalError::InvalidArgs.code(),
                };
            }
            (CommandCode::WriteStorage, RequestInfo::Storage(info)) => {
                req.res = crate::error::result_code(&hal.write_storage(info.key_idx, &info.data));
            }
            (CommandCode::ReadStorage, RequestInfo::Storage(info)) => {
                req.res = complete(hal.read_storage(info.key_idx), &mut info.data);
            }
            (CommandCode::DeleteStorage, RequestInfo::Storage(info)) => {
                req.res = crate::error::result_code(&hal.delete_storage(info.key_idx));
            }
            (command, _) => {
                warn!(?command, "request payload does not match command group");
                return Err(SecurityError::Transport(format!(
                    "payload does not match {:?} command",
                    command.group()
                )));
            }
        }
        Ok(())
    }

    /// Boundary entry point: decodes the request, handles it and encodes the
    /// reply. The reply carries the result code and outputs only.
    pub fn handle_encoded(&mut self, cmd: u32, bytes: &[u8]) -> SecurityResult<Vec<u8>> {
        let Some(command) = CommandCode::from_code(cmd) else {
            warn!(cmd, "unknown dispatch command");
            return Err(SecurityError::UnknownCommand(cmd));
        };
        let mut req = Request::decode(bytes, &self.limits).map_err(SecurityError::Transport)?;
        self.handle(cmd, &mut req)?;
        req.drop_inputs(command);
        req.encode().map_err(SecurityError::Transport)
    }
}

fn complete(result: HalResult<HalData>, output: &mut HalData) -> i32 {
    match result {
        Ok(data) => {
            *output = data;
            0
        }
        Err(err) => err.code(),
    }
}

const AES_MODES: [HalAesMode; 12] = [
    HalAesMode::EcbNoPad,
    HalAesMode::EcbIso9797M1,
    HalAesMode::EcbIso9797M2,
    HalAesMode::EcbPkcs5,
    HalAesMode::EcbPkcs7,
    HalAesMode::CbcNoPad,
    HalAesMode::CbcIso9797M1,
    HalAesMode::CbcIso9797M2,
    HalAesMode::CbcPkcs5,
    HalAesMode::CbcPkcs7,
    HalAesMode::Ctr,
    HalAesMode::Unknown,
];

const HASHES: [HalHashType; 7] = [
    HalHashType::Md5,
    HalHashType::Sha1,
    HalHashType::Sha224,
    HalHashType::Sha256,
    HalHashType::Sha384,
    HalHashType::Sha512,
    HalHashType::Unknown,
];

const RSA_ALGORITHMS: [HalRsaAlgorithm; 3] = [
    HalRsaAlgorithm::RsassaPkcs1V15,
    HalRsaAlgorithm::RsassaPkcs1PssMgf1,
    HalRsaAlgorithm::Unknown,
];

fn aes_mode_code(mode: HalAesMode) -> u64 {
    AES_MODES.iter().position(|m| *m == mode).unwrap_or(AES_MODES.len() - 1) as u64
}

fn aes_mode_from_code(code: u64) -> HalAesMode {
    usize::try_from(code)
        .ok()
        .and_then(|idx| AES_MODES.get(idx).copied())
        .unwrap_or(HalAesMode::Unknown)
}

fn hash_code(hash: HalHashType) -> u64 {
    HASHES.iter().position(|h| *h == hash).unwrap_or(HASHES.len() - 1) as u64
}

fn hash_from_code(code: u64) -> HalHashType {
    usize::try_from(code)
        .ok()
        .and_then(|idx| HASHES.get(idx).copied())
        .unwrap_or(HalHashType::Unknown)
}

fn rsa_algorithm_code(algo: HalRsaAlgorithm) -> u64 {
    RSA_ALGORITHMS
        .iter()
        .position(|a| *a == algo)
        .unwrap_or(RSA_ALGORITHMS.len() - 1) as u64
}

fn rsa_algorithm_from_code(code: u64) -> HalRsaAlgorithm {
    usize::try_from(code)
        .ok()
        .and_then(|idx| RSA_ALGORITHMS.get(idx).copied())
        .unwrap_or(HalRsaAlgorithm::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::HalKeyType;
    use crate::soft_se::SoftSecureElement;

    fn dispatcher() -> Dispatcher<SoftSecureElement> {
        let mut hal = SoftSecureElement::default();
        hal.init().unwrap();
        hal.generate_key(HalKeyType::Aes128, SlotIndex(2)).unwrap();
        Dispatcher::new(hal, CborLimits::default())
    }

    fn aes_request(input: &[u8]) -> Request {
        Request::crypto(CryptoInfo {
            key_idx: SlotIndex(2),
            input: HalData::from_slice(input),
            aes_param: Some(HalAesParam {
                mode: HalAesMode::EcbNoPad,
                iv: Vec::new(),
            }),
            rsa_mode: None,
            output: HalData::default(),
        })
    }

    #[test]
    fn command_codes_round_trip() {
        for cmd in CommandCode::ALL {
            assert_eq!(CommandCode::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(CommandCode::from_code(0xdead), None);
    }

    #[test]
    fn each_command_makes_exactly_one_hardware_call() {
        let mut dispatcher = dispatcher();
        let before = dispatcher.hal().call_count();
        let mut req = aes_request(&[1u8; 16]);
        dispatcher.handle(CommandCode::AesEncrypt.code(), &mut req).unwrap();
        assert_eq!(req.res, 0);
        assert_eq!(dispatcher.hal().call_count(), before + 1);
        match &req.info {
            RequestInfo::Crypto(info) => assert_eq!(info.output.data_len(), 16),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn unknown_command_fails_without_touching_the_request() {
        let mut dispatcher = dispatcher();
        let before = dispatcher.hal().call_count();
        let mut req = aes_request(&[1u8; 16]);
        let snapshot = req.clone();
        let result = dispatcher.handle(0x0999, &mut req);
        assert!(matches!(result, Err(SecurityError::UnknownCommand(0x0999))));
        assert_eq!(req, snapshot);
        assert_eq!(dispatcher.hal().call_count(), before);
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let mut dispatcher = dispatcher();
        let before = dispatcher.hal().call_count();
        let mut req = aes_request(&[1u8; 16]);
        let result = dispatcher.handle(CommandCode::ReadStorage.code(), &mut req);
        assert!(matches!(result, Err(SecurityError::Transport(_))));
        assert_eq!(dispatcher.hal().call_count(), before);
    }

    #[test]
    fn hardware_failure_lands_in_the_result_code() {
        let mut dispatcher = dispatcher();
        let mut req = Request::storage(StorageInfo {
            key_idx: SlotIndex(5),
            data: HalData::default(),
        });
        dispatcher.handle(CommandCode::ReadStorage.code(), &mut req).unwrap();
        assert_eq!(req.res, HalError::EmptySlot.code());
        assert_eq!(req.hal_result(), Err(HalError::EmptySlot));
    }

    #[test]
    fn encoded_requests_cross_the_boundary() {
        let mut dispatcher = dispatcher();
        let mut req = Request::storage(StorageInfo {
            key_idx: SlotIndex(4),
            data: HalData::from_slice(b"record"),
        });
        let bytes = req.encode().unwrap();
        let reply = dispatcher
            .handle_encoded(CommandCode::WriteStorage.code(), &bytes)
            .unwrap();
        req = Request::decode(&reply, &CborLimits::default()).unwrap();
        assert_eq!(req.res, 0);

        let read = Request::storage(StorageInfo {
            key_idx: SlotIndex(4),
            data: HalData::default(),
        });
        let reply = dispatcher
            .handle_encoded(CommandCode::ReadStorage.code(), &read.encode().unwrap())
            .unwrap();
        let read = Request::decode(&reply, &CborLimits::default()).unwrap();
        match read.info {
            RequestInfo::Storage(info) => assert_eq!(info.data.data, b"record".to_vec()),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn rsa_mode_survives_encoding() {
        let req = Request::crypto(CryptoInfo {
            key_idx: SlotIndex(1),
            input: HalData::from_slice(&[1u8; 8]),
            aes_param: None,
            rsa_mode: Some(HalRsaMode {
                rsa_a: HalRsaAlgorithm::RsassaPkcs1PssMgf1,
                hash: HalHashType::Sha256,
                mgf: HalHashType::Sha1,
                salt_byte_len: 64,
            }),
            output: HalData::default(),
        });
        let decoded = Request::decode(&req.encode().unwrap(), &CborLimits::default()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn crypto_command_without_its_mode_records_invalid_args() {
        let mut dispatcher = dispatcher();
        let before = dispatcher.hal().call_count();
        let mut req = aes_request(&[1u8; 16]);
        if let RequestInfo::Crypto(info) = &mut req.info {
            info.aes_param = None;
        }
        dispatcher.handle(CommandCode::AesEncrypt.code(), &mut req).unwrap();
        assert_eq!(req.res, HalError::InvalidArgs.code());
        assert_eq!(req.hal_result(), Err(HalError::InvalidArgs));

        let mut req = aes_request(&[1u8; 16]);
        dispatcher.handle(CommandCode::RsaDecrypt.code(), &mut req).unwrap();
        assert_eq!(req.res, HalError::InvalidArgs.code());
        assert_eq!(dispatcher.hal().call_count(), before);
    }

    #[test]
    fn rsa_commands_round_trip_through_the_dispatcher() {
        let mut dispatcher = dispatcher();
        dispatcher
            .hal_mut()
            .generate_key(HalKeyType::Rsa1024, SlotIndex(3))
            .unwrap();
        let mode = HalRsaMode {
            rsa_a: HalRsaAlgorithm::RsassaPkcs1PssMgf1,
            hash: HalHashType::Sha256,
            mgf: HalHashType::Sha256,
            salt_byte_len: 32,
        };
        let rsa_request = |input: &[u8]| {
            Request::crypto(CryptoInfo {
                key_idx: SlotIndex(3),
                input: HalData::from_slice(input),
                aes_param: None,
                rsa_mode: Some(mode),
                output: HalData::default(),
            })
        };

        let mut enc = rsa_request(b"wrapped secret");
        dispatcher.handle(CommandCode::RsaEncrypt.code(), &mut enc).unwrap();
        assert_eq!(enc.res, 0);
        let cipher = match enc.info {
            RequestInfo::Crypto(info) => info.output,
            other => panic!("unexpected payload {other:?}"),
        };
        assert_eq!(cipher.data_len(), 128);

        let mut dec = rsa_request(&cipher.data);
        let reply = dispatcher
            .handle_encoded(CommandCode::RsaDecrypt.code(), &dec.encode().unwrap())
            .unwrap();
        dec = Request::decode(&reply, &CborLimits::default()).unwrap();
        assert_eq!(dec.res, 0);
        match dec.info {
            RequestInfo::Crypto(info) => assert_eq!(info.output.data, b"wrapped secret".to_vec()),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn replies_carry_outputs_but_not_inputs() {
        let mut dispatcher = dispatcher();
        let req = aes_request(&[4u8; 64]);
        let reply = dispatcher
            .handle_encoded(CommandCode::AesEncrypt.code(), &req.encode().unwrap())
            .unwrap();
        let reply = Request::decode(&reply, &CborLimits::default()).unwrap();
        match reply.info {
            RequestInfo::Crypto(info) => {
                assert!(info.input.data.is_empty());
                assert_eq!(info.output.data_len(), 64);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let write = Request::storage(StorageInfo {
            key_idx: SlotIndex(7),
            data: HalData::from_slice(&[9u8; 64]),
        });
        let reply = dispatcher
            .handle_encoded(CommandCode::WriteStorage.code(), &write.encode().unwrap())
            .unwrap();
        let reply = Request::decode(&reply, &CborLimits::default()).unwrap();
        match reply.info {
            RequestInfo::Storage(info) => assert!(info.data.data.is_empty()),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn unknown_command_wins_over_an_undecodable_payload() {
        let mut dispatcher = dispatcher();
        let result = dispatcher.handle_encoded(0x0999, &[0xff, 0x00]);
        assert!(matches!(result, Err(SecurityError::UnknownCommand(0x0999))));
    }

    #[test]
    fn garbage_is_a_transport_error() {
        let mut dispatcher = dispatcher();
        let result = dispatcher.handle_encoded(CommandCode::AesEncrypt.code(), &[0xff, 0x00]);
        assert!(matches!(result, Err(SecurityError::Transport(_))));
    }
}
