use crate::error::HalResult;
use crate::hal::{
    HalAesParam, HalData, HalEcdsaMode, HalHashType, HalHmacType, HalKeyType, HalRsaMode,
};
use crate::types::SlotIndex;

/// Contract of the secure element hardware layer.
///
/// Every call is synchronous; an `Err` stands for a non-zero hardware return
/// code. Output buffers are produced by the hardware and handed back by value.
pub trait SecureElementHal {
    fn init(&mut self) -> HalResult<()>;
    fn deinit(&mut self) -> HalResult<()>;

    fn generate_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()>;
    fn set_key(
        &mut self,
        key_type: HalKeyType,
        slot: SlotIndex,
        public: &HalData,
        private: &HalData,
    ) -> HalResult<()>;
    /// Public part of a key. Elliptic-curve keys carry `y` in the auxiliary field.
    fn get_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<HalData>;
    fn remove_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()>;

    fn aes_encrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn aes_decrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn rsa_encrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn rsa_decrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn ecdsa_sign_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn ecdsa_verify_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        signature: &HalData,
        slot: SlotIndex,
    ) -> HalResult<()>;

    fn write_storage(&mut self, slot: SlotIndex, data: &HalData) -> HalResult<()>;
    fn read_storage(&mut self, slot: SlotIndex) -> HalResult<HalData>;
    fn delete_storage(&mut self, slot: SlotIndex) -> HalResult<()>;

    fn generate_random(&mut self, len: u32) -> HalResult<HalData>;
    fn get_hash(&mut self, hash_type: HalHashType, input: &HalData) -> HalResult<HalData>;
    fn get_hmac(
        &mut self,
        hmac_type: HalHmacType,
        input: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData>;
    fn get_certificate(&mut self, slot: SlotIndex) -> HalResult<HalData>;
}

impl<H: SecureElementHal + ?Sized> SecureElementHal for Box<H> {
    fn init(&mut self) -> HalResult<()> {
        (**self).init()
    }

    fn deinit(&mut self) -> HalResult<()> {
        (**self).deinit()
    }

    fn generate_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
        (**self).generate_key(key_type, slot)
    }

    fn set_key(
        &mut self,
        key_type: HalKeyType,
        slot: SlotIndex,
        public: &HalData,
        private: &HalData,
    ) -> HalResult<()> {
        (**self).set_key(key_type, slot, public, private)
    }

    fn get_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<HalData> {
        (**self).get_key(key_type, slot)
    }

    fn remove_key(&mut self, key_type: HalKeyType, slot: SlotIndex) -> HalResult<()> {
        (**self).remove_key(key_type, slot)
    }

    fn aes_encrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).aes_encrypt(input, param, slot)
    }

    fn aes_decrypt(
        &mut self,
        input: &HalData,
        param: &HalAesParam,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).aes_decrypt(input, param, slot)
    }

    fn rsa_encrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).rsa_encrypt(input, mode, slot)
    }

    fn rsa_decrypt(
        &mut self,
        input: &HalData,
        mode: &HalRsaMode,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).rsa_decrypt(input, mode, slot)
    }

    fn ecdsa_sign_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).ecdsa_sign_md(mode, hash, slot)
    }

    fn ecdsa_verify_md(
        &mut self,
        mode: &HalEcdsaMode,
        hash: &HalData,
        signature: &HalData,
        slot: SlotIndex,
    ) -> HalResult<()> {
        (**self).ecdsa_verify_md(mode, hash, signature, slot)
    }

    fn write_storage(&mut self, slot: SlotIndex, data: &HalData) -> HalResult<()> {
        (**self).write_storage(slot, data)
    }

    fn read_storage(&mut self, slot: SlotIndex) -> HalResult<HalData> {
        (**self).read_storage(slot)
    }

    fn delete_storage(&mut self, slot: SlotIndex) -> HalResult<()> {
        (**self).delete_storage(slot)
    }

    fn generate_random(&mut self, len: u32) -> HalResult<HalData> {
        (**self).generate_random(len)
    }

    fn get_hash(&mut self, hash_type: HalHashType, input: &HalData) -> HalResult<HalData> {
        (**self).get_hash(hash_type, input)
    }

    fn get_hmac(
        &mut self,
        hmac_type: HalHmacType,
        input: &HalData,
        slot: SlotIndex,
    ) -> HalResult<HalData> {
        (**self).get_hmac(hmac_type, input, slot)
    }

    fn get_certificate(&mut self, slot: SlotIndex) -> HalResult<HalData> {
        (**self).get_certificate(slot)
    }
}
