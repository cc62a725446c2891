//! # Software Primitive Engine
//!
//! [`PrimitiveEngine`] over the RustCrypto digests and block ciphers, an
//! in-crate RC4 and textbook RSA on `rsa::BigUint`.
//!
//! RSA blocks are raw modular exponentiation; padding is applied by the
//! service so that SSL2 fallback markers and signature layouts stay under
//! its control.

use cipher::{Block, BlockDecrypt, BlockEncrypt, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::BigUint;
use sha1::Digest;
use zeroize::Zeroizing;

use super::rc4::Rc4State;
use crate::domain::algorithms::AlgId;
use crate::domain::blob::{RsaPrivateParts, RsaPublicParts};
use crate::domain::errors::{CspError, CspResult};
use crate::ports::outbound::{Direction, PrimitiveEngine, RsaExponent};

// =============================================================================
// CONTEXTS
// =============================================================================

/// Running digest.
#[derive(Clone)]
pub enum SoftHash {
    Md2(md2::Md2),
    Md4(md4::Md4),
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
}

impl std::fmt::Debug for SoftHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SoftHash::Md2(_) => "Md2",
            SoftHash::Md4(_) => "Md4",
            SoftHash::Md5(_) => "Md5",
            SoftHash::Sha1(_) => "Sha1",
        };
        write!(f, "SoftHash::{name}")
    }
}

/// Private half of an RSA pair, with CRT values.
#[derive(Clone)]
struct RsaSecret {
    d: BigUint,
    p: BigUint,
    q: BigUint,
    dp: BigUint,
    dq: BigUint,
    qinv: BigUint,
}

#[derive(Clone)]
pub struct RsaMaterial {
    n: BigUint,
    e: BigUint,
    public_exponent: u32,
    secret: Option<RsaSecret>,
}

impl RsaMaterial {
    fn modulus_len(&self) -> usize {
        (self.n.bits() + 7) / 8
    }

    fn has_private(&self) -> bool {
        self.secret.is_some()
    }
}

/// Scheduled key material.
#[derive(Clone, Default)]
pub enum SoftKey {
    /// No transform attached (fresh keys, master secrets, MAC sub-keys).
    #[default]
    Empty,
    Des(Zeroizing<Vec<u8>>),
    Tdes2(Zeroizing<Vec<u8>>),
    Tdes3(Zeroizing<Vec<u8>>),
    Rc2 {
        key: Zeroizing<Vec<u8>>,
        effective_bits: usize,
    },
    Rc4(Rc4State),
    Rsa(Box<RsaMaterial>),
}

impl SoftKey {
    /// True when an RSA private exponent is loaded.
    pub fn has_private_key(&self) -> bool {
        matches!(self, SoftKey::Rsa(m) if m.has_private())
    }

    fn rsa(&self) -> CspResult<&RsaMaterial> {
        match self {
            SoftKey::Rsa(material) => Ok(material),
            _ => Err(CspError::BadKey("no RSA key material")),
        }
    }
}

impl std::fmt::Debug for SoftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftKey::Empty => f.write_str("SoftKey::Empty"),
            SoftKey::Des(_) => f.write_str("SoftKey::Des(..)"),
            SoftKey::Tdes2(_) => f.write_str("SoftKey::Tdes2(..)"),
            SoftKey::Tdes3(_) => f.write_str("SoftKey::Tdes3(..)"),
            SoftKey::Rc2 { effective_bits, .. } => {
                write!(f, "SoftKey::Rc2 {{ effective_bits: {effective_bits} }}")
            }
            SoftKey::Rc4(_) => f.write_str("SoftKey::Rc4(..)"),
            SoftKey::Rsa(m) => write!(
                f,
                "SoftKey::Rsa {{ bits: {}, private: {} }}",
                m.n.bits(),
                m.has_private()
            ),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn block_transform<C>(cipher: C, input: &[u8], direction: Direction) -> CspResult<Vec<u8>>
where
    C: BlockEncrypt + BlockDecrypt,
{
    if input.len() != C::block_size() {
        return Err(CspError::BadData("input is not one cipher block"));
    }
    let mut block = Block::<C>::clone_from_slice(input);
    match direction {
        Direction::Encrypt => cipher.encrypt_block(&mut block),
        Direction::Decrypt => cipher.decrypt_block(&mut block),
    }
    Ok(block.to_vec())
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> CspResult<C> {
    C::new_from_slice(key).map_err(|_| CspError::BadKey("invalid key length for cipher"))
}

fn material_prefix(material: &[u8], len: usize) -> CspResult<Zeroizing<Vec<u8>>> {
    material
        .get(..len)
        .map(|bytes| Zeroizing::new(bytes.to_vec()))
        .ok_or(CspError::BadKey("key material too short"))
}

fn to_le_fixed(value: &BigUint, len: usize) -> Vec<u8> {
    let mut bytes = value.to_bytes_le();
    bytes.resize(len.max(bytes.len()), 0);
    bytes.truncate(len);
    bytes
}

fn to_be_fixed(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes[bytes.len().saturating_sub(len)..]);
    out
}

/// `q^-1 mod p` for prime `p`, by Fermat's little theorem.
fn crt_coefficient(p: &BigUint, q: &BigUint) -> BigUint {
    let two = BigUint::from(2u32);
    (q % p).modpow(&(p - &two), p)
}

fn crt_exponents(d: &BigUint, p: &BigUint, q: &BigUint) -> (BigUint, BigUint) {
    let one = BigUint::from(1u32);
    (d % &(p - &one), d % &(q - &one))
}

// =============================================================================
// ENGINE
// =============================================================================

/// Primitive engine backed by pure-Rust implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwarePrimitives;

impl SoftwarePrimitives {
    pub fn new() -> Self {
        Self
    }
}

impl PrimitiveEngine for SoftwarePrimitives {
    type HashContext = SoftHash;
    type KeyContext = SoftKey;

    fn init_hash(&self, alg: AlgId) -> CspResult<SoftHash> {
        Ok(match alg {
            AlgId::MD2 => SoftHash::Md2(md2::Md2::new()),
            AlgId::MD4 => SoftHash::Md4(md4::Md4::new()),
            AlgId::MD5 => SoftHash::Md5(md5::Md5::new()),
            AlgId::SHA => SoftHash::Sha1(sha1::Sha1::new()),
            other => return Err(CspError::BadAlgorithm(other.0)),
        })
    }

    fn update_hash(&self, ctx: &mut SoftHash, data: &[u8]) {
        match ctx {
            SoftHash::Md2(h) => h.update(data),
            SoftHash::Md4(h) => h.update(data),
            SoftHash::Md5(h) => h.update(data),
            SoftHash::Sha1(h) => h.update(data),
        }
    }

    fn finalize_hash(&self, ctx: SoftHash) -> Vec<u8> {
        match ctx {
            SoftHash::Md2(h) => h.finalize().to_vec(),
            SoftHash::Md4(h) => h.finalize().to_vec(),
            SoftHash::Md5(h) => h.finalize().to_vec(),
            SoftHash::Sha1(h) => h.finalize().to_vec(),
        }
    }

    fn setup_key(
        &self,
        alg: AlgId,
        ctx: &mut SoftKey,
        key_len: usize,
        salt_len: usize,
        material: &[u8],
    ) -> CspResult<()> {
        let keyed = key_len + salt_len;
        *ctx = match alg {
            AlgId::DES => SoftKey::Des(material_prefix(material, 8)?),
            AlgId::DES3_112 => SoftKey::Tdes2(material_prefix(material, 16)?),
            AlgId::DES3 => SoftKey::Tdes3(material_prefix(material, 24)?),
            AlgId::RC2 => SoftKey::Rc2 {
                key: material_prefix(material, keyed)?,
                effective_bits: key_len * 8,
            },
            AlgId::RC4 => SoftKey::Rc4(Rc4State::new(&material_prefix(material, keyed)?)),
            // RSA pairs are set up by generation or import
            AlgId::RSA_SIGN | AlgId::RSA_KEYX => return Ok(()),
            _ => SoftKey::Empty,
        };
        Ok(())
    }

    fn new_key_pair(&self, ctx: &mut SoftKey, bits: usize, public_exponent: u32) -> CspResult<()> {
        #[cfg(feature = "tracing-log")]
        tracing::debug!("[csp] generating {}-bit RSA pair", bits);

        let key = rsa::RsaPrivateKey::new_with_exp(&mut OsRng, bits, &BigUint::from(public_exponent))
            .map_err(|e| CspError::Failure(format!("RSA key generation failed: {e}")))?;
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(CspError::Failure("expected a two-prime RSA key".to_string()));
        }
        let (p, q) = (primes[0].clone(), primes[1].clone());
        let d = key.d().clone();
        let (dp, dq) = crt_exponents(&d, &p, &q);
        let qinv = crt_coefficient(&p, &q);

        *ctx = SoftKey::Rsa(Box::new(RsaMaterial {
            n: key.n().clone(),
            e: key.e().clone(),
            public_exponent,
            secret: Some(RsaSecret {
                d,
                p,
                q,
                dp,
                dq,
                qinv,
            }),
        }));
        Ok(())
    }

    fn encrypt_block(&self, ctx: &SoftKey, input: &[u8], direction: Direction) -> CspResult<Vec<u8>> {
        match ctx {
            SoftKey::Des(key) => block_transform(new_cipher::<des::Des>(key)?, input, direction),
            SoftKey::Tdes2(key) => {
                block_transform(new_cipher::<des::TdesEde2>(key)?, input, direction)
            }
            SoftKey::Tdes3(key) => {
                block_transform(new_cipher::<des::TdesEde3>(key)?, input, direction)
            }
            SoftKey::Rc2 {
                key,
                effective_bits,
            } => {
                let cipher = rc2::Rc2::new_with_eff_key_len(key, *effective_bits);
                block_transform(cipher, input, direction)
            }
            _ => Err(CspError::BadKey("key has no block cipher")),
        }
    }

    fn encrypt_stream(&self, ctx: &mut SoftKey, data: &mut [u8]) -> CspResult<()> {
        match ctx {
            SoftKey::Rc4(state) => {
                state.apply(data);
                Ok(())
            }
            _ => Err(CspError::BadKey("key has no stream cipher")),
        }
    }

    fn rsa_block(
        &self,
        ctx: &SoftKey,
        input: &[u8],
        direction: Direction,
        exponent: RsaExponent,
    ) -> CspResult<Vec<u8>> {
        let rsa = ctx.rsa()?;
        let len = rsa.modulus_len();
        if input.len() > len {
            return Err(CspError::BadData("input longer than the modulus"));
        }
        let value = match direction {
            Direction::Encrypt => BigUint::from_bytes_be(input),
            Direction::Decrypt => BigUint::from_bytes_le(input),
        };
        if value >= rsa.n {
            return Err(CspError::BadData("input not reduced modulo n"));
        }
        let exp = match exponent {
            RsaExponent::Public => &rsa.e,
            RsaExponent::Private => {
                &rsa.secret
                    .as_ref()
                    .ok_or(CspError::BadKey("public key only"))?
                    .d
            }
        };
        let out = value.modpow(exp, &rsa.n);
        Ok(match direction {
            Direction::Encrypt => to_le_fixed(&out, len),
            Direction::Decrypt => to_be_fixed(&out, len),
        })
    }

    fn export_public_key(&self, ctx: &SoftKey) -> CspResult<RsaPublicParts> {
        let rsa = ctx.rsa()?;
        let len = rsa.modulus_len();
        Ok(RsaPublicParts {
            bit_len: (len * 8) as u32,
            exponent: rsa.public_exponent,
            modulus: to_le_fixed(&rsa.n, len),
        })
    }

    fn export_private_key(&self, ctx: &SoftKey) -> CspResult<RsaPrivateParts> {
        let rsa = ctx.rsa()?;
        let secret = rsa
            .secret
            .as_ref()
            .ok_or(CspError::BadKey("public key only"))?;
        let len = rsa.modulus_len();
        let half = (len + 1) / 2;
        Ok(RsaPrivateParts {
            public: self.export_public_key(ctx)?,
            prime1: to_le_fixed(&secret.p, half),
            prime2: to_le_fixed(&secret.q, half),
            exponent1: to_le_fixed(&secret.dp, half),
            exponent2: to_le_fixed(&secret.dq, half),
            coefficient: to_le_fixed(&secret.qinv, half),
            private_exponent: to_le_fixed(&secret.d, len),
        })
    }

    fn import_public_key(&self, ctx: &mut SoftKey, parts: &RsaPublicParts) -> CspResult<()> {
        let n = BigUint::from_bytes_le(&parts.modulus);
        if n.bits() == 0 {
            return Err(CspError::BadData("zero modulus"));
        }
        *ctx = SoftKey::Rsa(Box::new(RsaMaterial {
            n,
            e: BigUint::from(parts.exponent),
            public_exponent: parts.exponent,
            secret: None,
        }));
        Ok(())
    }

    fn import_private_key(&self, ctx: &mut SoftKey, parts: &RsaPrivateParts) -> CspResult<()> {
        self.import_public_key(ctx, &parts.public)?;
        let secret = RsaSecret {
            d: BigUint::from_bytes_le(&parts.private_exponent),
            p: BigUint::from_bytes_le(&parts.prime1),
            q: BigUint::from_bytes_le(&parts.prime2),
            dp: BigUint::from_bytes_le(&parts.exponent1),
            dq: BigUint::from_bytes_le(&parts.exponent2),
            qinv: BigUint::from_bytes_le(&parts.coefficient),
        };
        if secret.d.bits() == 0 {
            return Err(CspError::BadData("zero private exponent"));
        }
        if let SoftKey::Rsa(material) = ctx {
            material.secret = Some(secret);
        }
        Ok(())
    }

    fn gen_random(&self, buf: &mut [u8]) -> CspResult<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CspError::Failure(format!("system RNG failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SoftwarePrimitives {
        SoftwarePrimitives::new()
    }

    fn digest(alg: AlgId, data: &[u8]) -> String {
        let e = engine();
        let mut ctx = e.init_hash(alg).unwrap();
        e.update_hash(&mut ctx, data);
        hex::encode(e.finalize_hash(ctx))
    }

    #[test]
    fn test_digest_vectors() {
        assert_eq!(digest(AlgId::MD5, b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(digest(AlgId::SHA, b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(digest(AlgId::MD4, b"abc"), "a448017aaf21d8525fc10ae87aa6729d");
        assert_eq!(digest(AlgId::MD2, b"abc"), "da853b0d3f88d99b30283a69e6ded6bb");
        assert!(matches!(
            engine().init_hash(AlgId::HMAC),
            Err(CspError::BadAlgorithm(0x8009))
        ));
    }

    #[test]
    fn test_des_block_vector() {
        let e = engine();
        let mut ctx = SoftKey::default();
        let key = hex::decode("133457799bbcdff1").unwrap();
        e.setup_key(AlgId::DES, &mut ctx, 8, 0, &key).unwrap();
        let plain = hex::decode("0123456789abcdef").unwrap();
        let cipher = e.encrypt_block(&ctx, &plain, Direction::Encrypt).unwrap();
        assert_eq!(hex::encode(&cipher), "85e813540f0ab405");
        assert_eq!(e.encrypt_block(&ctx, &cipher, Direction::Decrypt).unwrap(), plain);
        assert!(matches!(
            e.encrypt_block(&ctx, &plain[..7], Direction::Encrypt),
            Err(CspError::BadData(_))
        ));
    }

    #[test]
    fn test_two_key_triple_des_matches_three_key_with_k1_repeated() {
        let e = engine();
        let key: Vec<u8> = (1..=16).collect();
        let mut two = SoftKey::default();
        e.setup_key(AlgId::DES3_112, &mut two, 16, 0, &key).unwrap();
        let mut three = SoftKey::default();
        let long = [&key[..], &key[..8]].concat();
        e.setup_key(AlgId::DES3, &mut three, 24, 0, &long).unwrap();
        let block = [0x42u8; 8];
        assert_eq!(
            e.encrypt_block(&two, &block, Direction::Encrypt).unwrap(),
            e.encrypt_block(&three, &block, Direction::Encrypt).unwrap()
        );
    }

    #[test]
    fn test_rc2_round_trip_and_stream_rejected() {
        let e = engine();
        let mut ctx = SoftKey::default();
        e.setup_key(AlgId::RC2, &mut ctx, 5, 11, &[7u8; 16]).unwrap();
        let block = *b"8 bytes!";
        let c = e.encrypt_block(&ctx, &block, Direction::Encrypt).unwrap();
        assert_ne!(c, block);
        assert_eq!(e.encrypt_block(&ctx, &c, Direction::Decrypt).unwrap(), block);
        assert!(matches!(e.encrypt_stream(&mut ctx, &mut [0u8; 4]), Err(CspError::BadKey(_))));
    }

    #[test]
    fn test_rc4_uses_key_and_salt() {
        let e = engine();
        let mut ctx = SoftKey::default();
        e.setup_key(AlgId::RC4, &mut ctx, 3, 0, b"Key").unwrap();
        let mut data = *b"Plaintext";
        e.encrypt_stream(&mut ctx, &mut data).unwrap();
        assert_eq!(hex::encode(data), "bbf316e8d940af0ad3");
    }

    #[test]
    fn test_short_material_rejected() {
        let mut ctx = SoftKey::default();
        assert!(matches!(
            engine().setup_key(AlgId::DES3, &mut ctx, 24, 0, &[0u8; 16]),
            Err(CspError::BadKey(_))
        ));
    }

    #[test]
    fn test_rsa_pair_round_trip_and_export() {
        let e = engine();
        let mut ctx = SoftKey::default();
        e.new_key_pair(&mut ctx, 512, 65537).unwrap();
        assert!(ctx.has_private_key());
        assert_eq!(e.export_public_key(&ctx).unwrap().exponent, 65537);

        let mut block = vec![0u8; 64];
        block[1] = 2;
        block[63] = 0x99;
        let wire = e.rsa_block(&ctx, &block, Direction::Encrypt, RsaExponent::Public).unwrap();
        assert_eq!(wire.len(), 64);
        let back = e.rsa_block(&ctx, &wire, Direction::Decrypt, RsaExponent::Private).unwrap();
        assert_eq!(back, block);

        let private = e.export_private_key(&ctx).unwrap();
        assert_eq!(private.public.bit_len, 512);
        assert_eq!(private.prime1.len(), 32);
        let mut copy = SoftKey::default();
        e.import_private_key(&mut copy, &private).unwrap();
        let again = e.rsa_block(&copy, &wire, Direction::Decrypt, RsaExponent::Private).unwrap();
        assert_eq!(again, block);

        let mut public_only = SoftKey::default();
        e.import_public_key(&mut public_only, &private.public).unwrap();
        assert!(!public_only.has_private_key());
        assert!(matches!(
            e.rsa_block(&public_only, &wire, Direction::Decrypt, RsaExponent::Private),
            Err(CspError::BadKey(_))
        ));
    }

    #[test]
    fn test_crt_values_consistent() {
        let e = engine();
        let mut ctx = SoftKey::default();
        e.new_key_pair(&mut ctx, 512, 65537).unwrap();
        let parts = e.export_private_key(&ctx).unwrap();
        let p = BigUint::from_bytes_le(&parts.prime1);
        let q = BigUint::from_bytes_le(&parts.prime2);
        let qinv = BigUint::from_bytes_le(&parts.coefficient);
        assert_eq!((&q * &qinv) % &p, BigUint::from(1u32));
        assert_eq!(&p * &q, BigUint::from_bytes_le(&parts.public.modulus));
    }

    #[test]
    fn test_gen_random_fills() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        engine().gen_random(&mut a).unwrap();
        engine().gen_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
