//! # TLS1 Derivation
//!
//! Master secret, key expansion and free-form PRF output, driven through the
//! engine's digests.

use super::*;
use crate::domain::algorithms::AlgId;
use crate::domain::entities::{HmacInfo, KeyState};
use crate::domain::tls1::{
    self, PrfMac, KEY_EXPANSION_LABEL, KEY_EXPANSION_LEN, MASTER_SECRET_LABEL, MASTER_SECRET_LEN,
};

/// HMAC computed with the engine's digest contexts.
struct EngineHmac<'e, E: PrimitiveEngine> {
    engine: &'e E,
    alg: AlgId,
    pads: HmacInfo,
}

impl<E: PrimitiveEngine> PrfMac for EngineHmac<'_, E> {
    fn mac(&mut self, parts: &[&[u8]]) -> CspResult<Vec<u8>> {
        let mut ctx = self.engine.init_hash(self.alg)?;
        self.engine.update_hash(&mut ctx, &self.pads.inner);
        for part in parts {
            self.engine.update_hash(&mut ctx, part);
        }
        let inner = self.engine.finalize_hash(ctx);

        let mut ctx = self.engine.init_hash(self.alg)?;
        self.engine.update_hash(&mut ctx, &self.pads.outer);
        self.engine.update_hash(&mut ctx, &inner);
        Ok(self.engine.finalize_hash(ctx))
    }
}

fn tls1_prf<E: PrimitiveEngine>(
    engine: &E,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    out_len: usize,
) -> CspResult<Vec<u8>> {
    tls1::prf(secret, label, seed, out_len, |alg, half| {
        let mut pads = HmacInfo::new(alg, &[], &[]);
        pads.mix_key(half);
        Ok(EngineHmac { engine, alg, pads })
    })
}

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// Replace a TLS1 pre-master secret by the master secret. Runs once per
    /// key; later calls see the `MasterKey` state and do nothing.
    pub(super) fn derive_master_secret(&mut self, key: KeyHandle) -> CspResult<()> {
        let engine = &self.engine;
        let master = self.keys.get_mut(key)?;
        if master.state == KeyState::MasterKey {
            return Ok(());
        }

        let seed = tls1::master_secret_seed(
            &master.schannel.client_random,
            &master.schannel.server_random,
        );
        let secret = zeroize::Zeroizing::new(tls1_prf(
            engine,
            master.key_bytes(),
            MASTER_SECRET_LABEL,
            &seed,
            MASTER_SECRET_LEN,
        )?);
        master.set_key_bytes(&secret);
        master.state = KeyState::MasterKey;

        #[cfg(feature = "tracing-log")]
        tracing::debug!("[csp] derived TLS1 master secret");

        Ok(())
    }

    /// The full key-expansion block of a master key.
    pub(super) fn key_expansion(&mut self, key: KeyHandle) -> CspResult<Vec<u8>> {
        self.derive_master_secret(key)?;
        let master = self.key(key)?;
        let seed = tls1::key_expansion_seed(
            &master.schannel.client_random,
            &master.schannel.server_random,
        );
        tls1_prf(&self.engine, master.key_bytes(), KEY_EXPANSION_LABEL, &seed, KEY_EXPANSION_LEN)
    }

    /// `len` bytes of PRF output keyed by the hash's master key over its
    /// label and seed.
    pub(super) fn prf_output(&self, hash: HashHandle, len: usize) -> CspResult<Vec<u8>> {
        let object = self.hash(hash)?;
        let master = object
            .key
            .and_then(|k| self.keys.get(k).ok())
            .ok_or_else(|| CspError::Failure("PRF hash has no master key".to_string()))?;
        tls1_prf(&self.engine, master.key_bytes(), &object.prf.label, &object.prf.seed, len)
    }
}
