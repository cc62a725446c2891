//! # Container Lifecycle
//!
//! Acquire, release and provider parameters. Long-term keys are loaded from
//! the keyset store when a container is opened and written back when its
//! last handle is released.

use super::*;
use crate::domain::algorithms::{KeySpec, Personality};
use crate::domain::blob::encode_private_blob;
use crate::domain::entities::KeysetScope;
use crate::domain::flags::*;
use crate::ports::inbound::{ParamValue, ProvParam};
use crate::ports::outbound::StoredKeyset;

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    pub(super) fn open_container(
        &mut self,
        container: Option<&str>,
        flags: u32,
        provider_name: Option<&str>,
    ) -> CspResult<Option<ContainerHandle>> {
        let mut flags = flags;
        if self.config.machine_keyset_default {
            flags |= CRYPT_MACHINE_KEYSET;
        }
        let personality = Personality::from_provider_name(provider_name);
        let provider_name = provider_name
            .map(str::to_string)
            .unwrap_or_else(|| personality.provider_name().to_string());
        let scope = KeysetScope::from_flags(flags);
        let given = container.filter(|name| !name.is_empty());
        let name = given.unwrap_or(&self.config.default_container).to_string();

        match flags & (CRYPT_NEWKEYSET | CRYPT_VERIFYCONTEXT | CRYPT_DELETEKEYSET) {
            0 => {
                if !self.store.exists(scope, &name)? {
                    #[cfg(feature = "tracing-log")]
                    tracing::debug!("[csp] no keyset {:?} in {:?} scope", name, scope);
                    return Err(CspError::KeysetNotFound(name));
                }
                let stored = self.store.load(scope, &name)?;
                let prov = self.register_container(name, flags, personality, provider_name)?;
                self.load_user_keys(prov, &stored)?;
                Ok(Some(prov))
            }
            CRYPT_NEWKEYSET => {
                self.store.create(scope, &name)?;
                #[cfg(feature = "tracing-log")]
                tracing::info!("[csp] created keyset {:?}", name);
                self.register_container(name, flags, personality, provider_name)
                    .map(Some)
            }
            CRYPT_VERIFYCONTEXT => {
                if given.is_some() {
                    return Err(CspError::BadFlags(flags));
                }
                self.register_container(String::new(), flags, personality, provider_name)
                    .map(Some)
            }
            CRYPT_DELETEKEYSET => {
                self.store.delete(scope, &name)?;
                Ok(None)
            }
            _ => Err(CspError::BadFlags(flags)),
        }
    }

    fn register_container(
        &mut self,
        name: String,
        flags: u32,
        personality: Personality,
        provider_name: String,
    ) -> CspResult<ContainerHandle> {
        #[cfg(feature = "tracing-log")]
        tracing::debug!("[csp] opening container {:?} as {:?}", name, personality);
        self.containers
            .create(KeyContainer::new(name, flags, personality, provider_name))
    }

    /// Import the stored private-key blobs into the container slots.
    fn load_user_keys(&mut self, prov: ContainerHandle, stored: &StoredKeyset) -> CspResult<()> {
        for spec in [KeySpec::KeyExchange, KeySpec::Signature] {
            let Some(blob) = stored.key(spec) else {
                continue;
            };
            let key = match self.import_blob(prov, blob, None, CRYPT_EXPORTABLE) {
                Ok(key) => key,
                Err(e) => {
                    self.discard_container(prov);
                    return Err(e);
                }
            };
            let container = self.containers.get_mut(prov)?;
            container.bind_user_key(spec, key);
        }
        Ok(())
    }

    pub(super) fn release_container(&mut self, prov: ContainerHandle, flags: u32) -> CspResult<()> {
        self.container(prov)?;
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        match self.containers.release(prov)? {
            Some(container) => {
                let persisted = self.persist_user_keys(&container);
                self.purge_objects(prov);
                persisted
            }
            None => Ok(()),
        }
    }

    /// Write the slot keys of a closing container back to the store.
    fn persist_user_keys(&mut self, container: &KeyContainer) -> CspResult<()> {
        if container.is_verify_only() || !self.config.persist_on_release {
            return Ok(());
        }
        let scope = container.scope();
        for spec in [KeySpec::KeyExchange, KeySpec::Signature] {
            let Some(handle) = container.user_key(spec) else {
                continue;
            };
            let Ok(key) = self.keys.get(handle) else {
                continue;
            };
            let Ok(private) = self.engine.export_private_key(&key.context) else {
                continue;
            };
            let blob = encode_private_blob(key.alg, &private);
            self.store.save_key(scope, &container.name, spec, &blob)?;
        }
        #[cfg(feature = "tracing-log")]
        tracing::debug!("[csp] persisted keyset {:?}", container.name);
        Ok(())
    }

    /// Release every key and hash created under `prov`.
    fn purge_objects(&mut self, prov: ContainerHandle) {
        for hash in self.hashes.handles_where(|h| h.container == prov) {
            let _ = self.hashes.release(hash);
        }
        for key in self.keys.handles_where(|k| k.container == prov) {
            let _ = self.keys.release(key);
        }
    }

    /// Drop a half-opened container without persisting anything.
    fn discard_container(&mut self, prov: ContainerHandle) {
        let _ = self.containers.release(prov);
        self.purge_objects(prov);
    }

    pub(super) fn prov_param(
        &mut self,
        prov: ContainerHandle,
        param: ProvParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        let container = self.container(prov)?;
        match param {
            ProvParam::Container => ParamValue::Text(container.name.clone()).fit(buffer_len),
            ProvParam::Name => ParamValue::Text(container.provider_name.clone()).fit(buffer_len),
            ProvParam::SigKeysizeInc | ProvParam::KeyxKeysizeInc => {
                ParamValue::Dword(KEYSIZE_INCREMENT).fit(buffer_len)
            }
            ProvParam::ImpType => ParamValue::Dword(CRYPT_IMPL_SOFTWARE).fit(buffer_len),
            ProvParam::Version => ParamValue::Dword(PROVIDER_VERSION).fit(buffer_len),
            ProvParam::EnumContainers => self.enum_containers(prov, buffer_len, flags),
            ProvParam::EnumAlgs | ProvParam::EnumAlgsEx => {
                self.enum_algs(prov, param == ProvParam::EnumAlgsEx, buffer_len, flags)
            }
        }
    }

    fn enum_containers(
        &mut self,
        prov: ContainerHandle,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        let container = self.containers.get_mut(prov)?;
        if flags & CRYPT_FIRST != 0 {
            container.enum_containers_cursor = Some(0);
        }
        let index = container.enum_containers_cursor.unwrap_or(0);
        let scope = KeysetScope::from_flags(container.flags | (flags & CRYPT_MACHINE_KEYSET));

        let names = self.store.list(scope)?;
        let name = names.get(index).ok_or(CspError::NoMoreItems)?;
        let value = ParamValue::Text(name.clone()).fit(buffer_len)?;

        self.containers.get_mut(prov)?.enum_containers_cursor = Some(index + 1);
        Ok(value)
    }

    fn enum_algs(
        &mut self,
        prov: ContainerHandle,
        extended: bool,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        let container = self.containers.get_mut(prov)?;
        let table = container.personality.algorithms();
        let index = if flags & CRYPT_FIRST != 0 {
            0
        } else {
            container.enum_algs_cursor.map_or(0, |cursor| cursor + 1)
        };
        let info = table.get(index).ok_or(CspError::NoMoreItems)?;
        let record = if extended {
            info.encode_enum_ex()
        } else {
            info.encode_enum()
        };
        let value = ParamValue::Bytes(record).fit(buffer_len)?;
        container.enum_algs_cursor = Some(index);
        Ok(value)
    }
}
