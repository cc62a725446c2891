//! # Provider API
//!
//! [`CryptoProviderApi`] for [`CryptoProvider`]. Every entry point validates
//! the container handle and then delegates to the operation modules.

use super::*;
use crate::domain::algorithms::AlgId;
use crate::ports::inbound::{
    CryptoProviderApi, HashParam, KeyParam, ParamInput, ParamValue, ProvParam,
};

impl<E, S> CryptoProviderApi for CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    // =========================================================================
    // CONTAINERS
    // =========================================================================

    fn acquire_context(
        &mut self,
        container: Option<&str>,
        flags: u32,
        provider_name: Option<&str>,
    ) -> CspResult<Option<ContainerHandle>> {
        self.open_container(container, flags, provider_name)
    }

    fn release_context(&mut self, prov: ContainerHandle, flags: u32) -> CspResult<()> {
        self.release_container(prov, flags)
    }

    fn get_prov_param(
        &mut self,
        prov: ContainerHandle,
        param: ProvParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        self.prov_param(prov, param, buffer_len, flags)
    }

    fn set_prov_param(&mut self, prov: ContainerHandle, param: u32, _flags: u32) -> CspResult<()> {
        self.container(prov)?;
        Err(CspError::BadType(param))
    }

    // =========================================================================
    // KEYS
    // =========================================================================

    fn gen_key(&mut self, prov: ContainerHandle, alg: AlgId, flags: u32) -> CspResult<KeyHandle> {
        self.container(prov)?;
        self.generate_key(prov, alg, flags)
    }

    fn derive_key(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        base_data: HashHandle,
        flags: u32,
    ) -> CspResult<KeyHandle> {
        self.container(prov)?;
        self.derive_session_key(prov, alg, base_data, flags)
    }

    fn destroy_key(&mut self, prov: ContainerHandle, key: KeyHandle) -> CspResult<()> {
        self.container(prov)?;
        self.release_key(key)
    }

    fn duplicate_key(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        reserved: u32,
        flags: u32,
    ) -> CspResult<KeyHandle> {
        self.container(prov)?;
        self.clone_key(key, reserved, flags)
    }

    fn get_key_param(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        param: KeyParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        self.container(prov)?;
        self.key_param(key, param, buffer_len, flags)
    }

    fn set_key_param(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        param: KeyParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()> {
        self.container(prov)?;
        self.store_key_param(key, param, value, flags)
    }

    fn export_key(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        wrapping_key: Option<KeyHandle>,
        blob_type: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        self.container(prov)?;
        self.export_blob(key, wrapping_key, blob_type, flags, buffer_len)
    }

    fn import_key(
        &mut self,
        prov: ContainerHandle,
        data: &[u8],
        unwrapping_key: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<KeyHandle> {
        self.container(prov)?;
        self.import_blob(prov, data, unwrapping_key, flags)
    }

    fn get_user_key(&mut self, prov: ContainerHandle, key_spec: u32) -> CspResult<KeyHandle> {
        self.container(prov)?;
        self.user_key(prov, key_spec)
    }

    // =========================================================================
    // TRANSFORMS
    // =========================================================================

    fn encrypt(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        self.container(prov)?;
        self.encrypt_data(key, hash, is_final, flags, data, buffer_len)
    }

    fn decrypt(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
    ) -> CspResult<Vec<u8>> {
        self.container(prov)?;
        self.decrypt_data(key, hash, is_final, flags, data)
    }

    // =========================================================================
    // HASHES
    // =========================================================================

    fn create_hash(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        key: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<HashHandle> {
        self.new_hash(prov, alg, key, flags)
    }

    fn hash_data(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        data: &[u8],
        flags: u32,
    ) -> CspResult<()> {
        self.container(prov)?;
        self.feed_hash(hash, data, flags)
    }

    fn hash_session_key(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        key: KeyHandle,
        flags: u32,
    ) -> CspResult<()> {
        self.container(prov)?;
        self.hash(hash)?;
        self.feed_session_key(hash, key, flags)
    }

    fn get_hash_param(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        param: HashParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        self.container(prov)?;
        self.hash_param(hash, param, buffer_len, flags)
    }

    fn set_hash_param(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        param: HashParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()> {
        self.container(prov)?;
        self.store_hash_param(hash, param, value, flags)
    }

    fn destroy_hash(&mut self, prov: ContainerHandle, hash: HashHandle) -> CspResult<()> {
        self.container(prov)?;
        self.release_hash(hash)
    }

    fn duplicate_hash(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        reserved: u32,
        flags: u32,
    ) -> CspResult<HashHandle> {
        self.container(prov)?;
        self.clone_hash(hash, reserved, flags)
    }

    // =========================================================================
    // SIGNATURES & RANDOMNESS
    // =========================================================================

    fn sign_hash(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        key_spec: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        self.container(prov)?;
        self.sign(prov, hash, key_spec, flags, buffer_len)
    }

    fn verify_signature(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        signature: &[u8],
        public_key: KeyHandle,
        flags: u32,
    ) -> CspResult<()> {
        self.container(prov)?;
        self.verify(hash, signature, public_key, flags)
    }

    fn gen_random(&mut self, prov: ContainerHandle, len: usize) -> CspResult<Vec<u8>> {
        self.container(prov)?;
        self.random_bytes(len)
    }
}
