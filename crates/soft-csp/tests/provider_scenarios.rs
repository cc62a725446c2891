//! # Provider Scenarios
//!
//! End-to-end flows through the public API: known-answer checks, TLS1 key
//! derivation against an independent PRF, signatures over imported public
//! keys, and keyset persistence on disk.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use soft_csp::domain::blob::encode_plaintext_blob;
use soft_csp::flags::*;
use soft_csp::{
    provider_names, AlgId, BlobType, ContainerHandle, CryptoProvider, CryptoProviderApi, CspError,
    FileBackedKeysetStore, HashParam, InMemoryKeysetStore, KeyHandle, KeyParam, KeySpec,
    KeysetStore, ParamInput, ParamValue, ProvParam, ProviderConfig, ProviderDependencies,
    SChannelAlg, SoftwarePrimitives,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn provider_with<S: KeysetStore>(store: S) -> CryptoProvider<SoftwarePrimitives, S> {
    init_tracing();
    let deps = ProviderDependencies {
        engine: SoftwarePrimitives::new(),
        store,
    };
    CryptoProvider::new(deps, ProviderConfig::default()).unwrap()
}

fn verify_context<A: CryptoProviderApi>(csp: &mut A, provider: &str) -> ContainerHandle {
    csp.acquire_context(None, CRYPT_VERIFYCONTEXT, Some(provider))
        .unwrap()
        .unwrap()
}

fn bytes(value: ParamValue) -> Vec<u8> {
    match value {
        ParamValue::Bytes(bytes) => bytes,
        other => panic!("expected bytes, got {other:?}"),
    }
}

fn plaintext_key<A: CryptoProviderApi>(csp: &mut A, prov: ContainerHandle, key: KeyHandle) -> Vec<u8> {
    let blob = csp
        .export_key(prov, key, None, BlobType::PLAINTEXTKEYBLOB, 0, 64)
        .unwrap();
    blob[12..].to_vec()
}

// =============================================================================
// REFERENCE TLS1 PRF
// =============================================================================

fn p_hash<M: Mac + KeyInit>(secret: &[u8], seed: &[u8], out: &mut [u8]) {
    let mac = |parts: &[&[u8]]| {
        let mut m = <M as KeyInit>::new_from_slice(secret).unwrap();
        for part in parts {
            m.update(part);
        }
        m.finalize().into_bytes().to_vec()
    };
    let mut a = mac(&[seed]);
    let mut pos = 0;
    while pos < out.len() {
        let block = mac(&[a.as_slice(), seed]);
        for (o, b) in out[pos..].iter_mut().zip(&block) {
            *o ^= b;
        }
        pos += block.len();
        a = mac(&[a.as_slice()]);
    }
}

fn reference_prf(secret: &[u8], label: &[u8], seed: &[u8], len: usize) -> Vec<u8> {
    let half = (secret.len() + 1) / 2;
    let label_seed = [label, seed].concat();
    let mut out = vec![0u8; len];
    p_hash::<Hmac<Md5>>(&secret[..half], &label_seed, &mut out);
    p_hash::<Hmac<Sha1>>(&secret[secret.len() / 2..], &label_seed, &mut out);
    out
}

// =============================================================================
// KNOWN ANSWERS
// =============================================================================

#[test]
fn test_des_ecb_vector() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_PROV);
    let blob = encode_plaintext_blob(AlgId::DES, &hex::decode("133457799bbcdff1").unwrap());
    let key = csp.import_key(prov, &blob, None, 0).unwrap();
    csp.set_key_param(prov, key, KeyParam::Mode, ParamInput::Dword(CRYPT_MODE_ECB), 0)
        .unwrap();

    let plain = hex::decode("0123456789abcdef").unwrap();
    let cipher = csp.encrypt(prov, key, None, false, 0, &plain, 8).unwrap();
    assert_eq!(hex::encode(cipher), "85e813540f0ab405");
}

#[test]
fn test_hmac_md5_rfc2104() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_ENHANCED_PROV);
    let blob = encode_plaintext_blob(AlgId::RC2, &[0x0b; 16]);
    let key = csp.import_key(prov, &blob, None, 0).unwrap();

    let hash = csp.create_hash(prov, AlgId::HMAC, Some(key), 0).unwrap();
    let info = ParamInput::HmacInfo {
        hash_alg: AlgId::MD5,
        inner: &[],
        outer: &[],
    };
    csp.set_hash_param(prov, hash, HashParam::HmacInfo, info, 0).unwrap();
    csp.hash_data(prov, hash, b"Hi There", 0).unwrap();

    let value = bytes(csp.get_hash_param(prov, hash, HashParam::HashValue, 64, 0).unwrap());
    assert_eq!(hex::encode(value), "9294727a3638bb1c13f48ef8158bfc9d");
}

#[test]
fn test_hmac_sha1_matches_reference() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_ENHANCED_PROV);
    let raw = [0x5au8; 16];
    let key = csp
        .import_key(prov, &encode_plaintext_blob(AlgId::RC4, &raw), None, 0)
        .unwrap();

    let hash = csp.create_hash(prov, AlgId::HMAC, Some(key), 0).unwrap();
    let info = ParamInput::HmacInfo {
        hash_alg: AlgId::SHA,
        inner: &[],
        outer: &[],
    };
    csp.set_hash_param(prov, hash, HashParam::HmacInfo, info, 0).unwrap();
    csp.hash_data(prov, hash, b"what do ya want ", 0).unwrap();
    csp.hash_data(prov, hash, b"for nothing?", 0).unwrap();

    let mut reference = <Hmac<Sha1> as KeyInit>::new_from_slice(&raw).unwrap();
    reference.update(b"what do ya want for nothing?");
    let expected = reference.finalize().into_bytes().to_vec();

    let value = bytes(csp.get_hash_param(prov, hash, HashParam::HashValue, 64, 0).unwrap());
    assert_eq!(value, expected);
    assert_eq!(
        csp.get_hash_param(prov, hash, HashParam::HashSize, 4, 0).unwrap(),
        ParamValue::Dword(20)
    );
}

// =============================================================================
// TLS1
// =============================================================================

const CLIENT_RANDOM: [u8; 32] = [0xc1; 32];
const SERVER_RANDOM: [u8; 32] = [0x5e; 32];

/// Version bytes 03 01 followed by 00..2d.
fn premaster() -> Vec<u8> {
    [&[0x03, 0x01][..], &(0u8..46).collect::<Vec<_>>()].concat()
}

/// A TLS1 master key over the fixed premaster, with both randoms and the
/// RC4/SHA cipher suite set.
fn tls1_master<A: CryptoProviderApi>(csp: &mut A, prov: ContainerHandle) -> KeyHandle {
    let blob = encode_plaintext_blob(AlgId::TLS1_MASTER, &premaster());
    let master = csp.import_key(prov, &blob, None, 0).unwrap();
    csp.set_key_param(prov, master, KeyParam::ClientRandom, ParamInput::Bytes(&CLIENT_RANDOM), 0)
        .unwrap();
    csp.set_key_param(prov, master, KeyParam::ServerRandom, ParamInput::Bytes(&SERVER_RANDOM), 0)
        .unwrap();
    let enc = SChannelAlg {
        usage: SCHANNEL_ENC_KEY,
        alg: AlgId::RC4.0,
        bits: 128,
        ..SChannelAlg::default()
    };
    let mac = SChannelAlg {
        usage: SCHANNEL_MAC_KEY,
        alg: AlgId::SHA.0,
        bits: 160,
        ..SChannelAlg::default()
    };
    csp.set_key_param(prov, master, KeyParam::SChannelAlg, ParamInput::SChannelAlg(enc), 0)
        .unwrap();
    csp.set_key_param(prov, master, KeyParam::SChannelAlg, ParamInput::SChannelAlg(mac), 0)
        .unwrap();
    master
}

#[test]
fn test_master_secret_derived_once() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_RSA_SCHANNEL_PROV);
    let master = tls1_master(&mut csp, prov);
    assert_eq!(plaintext_key(&mut csp, prov, master), premaster());

    csp.create_hash(prov, AlgId::SCHANNEL_MASTER_HASH, Some(master), 0)
        .unwrap();
    let secret = plaintext_key(&mut csp, prov, master);
    assert_eq!(
        hex::encode(&secret),
        "8d7c6030f3c1bded25e964b44f01bcc138b3d0ccfbf3328ee65423fa9ccf7e3a\
         909703a859218a262b9cd5e8b4e05022"
    );
    let seed = [CLIENT_RANDOM, SERVER_RANDOM].concat();
    assert_eq!(secret, reference_prf(&premaster(), b"master secret", &seed, 48));

    // a second master hash reuses the stored secret
    csp.create_hash(prov, AlgId::SCHANNEL_MASTER_HASH, Some(master), 0)
        .unwrap();
    assert_eq!(plaintext_key(&mut csp, prov, master), secret);
}

#[test]
fn test_generated_premaster_carries_version() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_RSA_SCHANNEL_PROV);
    let master = csp.gen_key(prov, AlgId::TLS1_MASTER, 0).unwrap();

    let premaster = plaintext_key(&mut csp, prov, master);
    assert_eq!(premaster.len(), 48);
    assert_eq!(&premaster[..2], &[0x03, 0x01]);
}

#[test]
fn test_schannel_session_keys_from_expansion() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_RSA_SCHANNEL_PROV);
    let master = tls1_master(&mut csp, prov);

    let hash = csp
        .create_hash(prov, AlgId::SCHANNEL_MASTER_HASH, Some(master), 0)
        .unwrap();
    let secret = plaintext_key(&mut csp, prov, master);
    let seed = [SERVER_RANDOM, CLIENT_RANDOM].concat();
    let expansion = reference_prf(&secret, b"key expansion", &seed, 104);

    let client_mac = csp.derive_key(prov, AlgId::SCHANNEL_MAC_KEY, hash, 0).unwrap();
    let server_mac = csp
        .derive_key(prov, AlgId::SCHANNEL_MAC_KEY, hash, CRYPT_SERVER)
        .unwrap();
    let client_enc = csp.derive_key(prov, AlgId::SCHANNEL_ENC_KEY, hash, 0).unwrap();
    let server_enc = csp
        .derive_key(prov, AlgId::SCHANNEL_ENC_KEY, hash, CRYPT_SERVER)
        .unwrap();

    assert_eq!(plaintext_key(&mut csp, prov, client_mac), expansion[..20].to_vec());
    assert_eq!(plaintext_key(&mut csp, prov, server_mac), expansion[20..40].to_vec());
    assert_eq!(plaintext_key(&mut csp, prov, client_enc), expansion[40..56].to_vec());
    assert_eq!(plaintext_key(&mut csp, prov, server_enc), expansion[56..72].to_vec());

    assert_eq!(
        csp.get_key_param(prov, client_enc, KeyParam::AlgId, 4, 0).unwrap(),
        ParamValue::Dword(AlgId::RC4.0)
    );
}

#[test]
fn test_tls1_prf_hash() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_RSA_SCHANNEL_PROV);
    let master = tls1_master(&mut csp, prov);

    assert!(matches!(
        csp.create_hash(prov, AlgId::TLS1PRF, Some(master), 0),
        Err(CspError::BadKeyState)
    ));

    csp.create_hash(prov, AlgId::SCHANNEL_MASTER_HASH, Some(master), 0)
        .unwrap();
    let secret = plaintext_key(&mut csp, prov, master);

    let prf = csp.create_hash(prov, AlgId::TLS1PRF, Some(master), 0).unwrap();
    csp.set_hash_param(prov, prf, HashParam::Tls1PrfLabel, ParamInput::Bytes(b"client finished"), 0)
        .unwrap();
    csp.set_hash_param(prov, prf, HashParam::Tls1PrfSeed, ParamInput::Bytes(&[0x11; 36]), 0)
        .unwrap();

    let output = bytes(csp.get_hash_param(prov, prf, HashParam::HashValue, 12, 0).unwrap());
    assert_eq!(output, reference_prf(&secret, b"client finished", &[0x11; 36], 12));
}

#[test]
fn test_tls1_hashes_need_tls1_master() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let prov = verify_context(&mut csp, provider_names::MS_DEF_RSA_SCHANNEL_PROV);
    let rc4 = csp.gen_key(prov, AlgId::RC4, 0).unwrap();
    assert!(matches!(
        csp.create_hash(prov, AlgId::SCHANNEL_MASTER_HASH, Some(rc4), 0),
        Err(CspError::BadKey(_))
    ));

    let strong = verify_context(&mut csp, provider_names::MS_STRONG_PROV);
    assert!(matches!(
        csp.create_hash(strong, AlgId::TLS1PRF, Some(rc4), 0),
        Err(CspError::BadAlgorithm(_))
    ));
}

// =============================================================================
// SIGNATURES
// =============================================================================

#[test]
fn test_signature_round_trip_through_public_blob() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let signer = verify_context(&mut csp, provider_names::MS_DEF_PROV);
    let pair = csp.gen_key(signer, AlgId(KeySpec::AT_SIGNATURE), 0).unwrap();
    let public_blob = csp
        .export_key(signer, pair, None, BlobType::PUBLICKEYBLOB, 0, 1024)
        .unwrap();

    let hash = csp.create_hash(signer, AlgId::SHA, None, 0).unwrap();
    csp.hash_data(signer, hash, b"signed payload", 0).unwrap();
    let signature = csp
        .sign_hash(signer, hash, KeySpec::AT_SIGNATURE, 0, 64)
        .unwrap();

    let verifier = verify_context(&mut csp, provider_names::MS_DEF_PROV);
    let public = csp.import_key(verifier, &public_blob, None, 0).unwrap();
    let check = csp.create_hash(verifier, AlgId::SHA, None, 0).unwrap();
    csp.hash_data(verifier, check, b"signed payload", 0).unwrap();
    csp.verify_signature(verifier, check, &signature, public, 0).unwrap();

    let mut flipped = signature.clone();
    flipped[0] ^= 0x80;
    assert!(matches!(
        csp.verify_signature(verifier, check, &flipped, public, 0),
        Err(CspError::BadSignature)
    ));

    let other = csp.create_hash(verifier, AlgId::SHA, None, 0).unwrap();
    csp.hash_data(verifier, other, b"different payload", 0).unwrap();
    assert!(matches!(
        csp.verify_signature(verifier, other, &signature, public, 0),
        Err(CspError::BadSignature)
    ));
}

#[test]
fn test_session_key_exchange_between_containers() {
    let mut csp = provider_with(InMemoryKeysetStore::new());
    let alice = verify_context(&mut csp, provider_names::MS_ENHANCED_PROV);
    let bob = verify_context(&mut csp, provider_names::MS_ENHANCED_PROV);

    let bob_pair = csp.gen_key(bob, AlgId(KeySpec::AT_KEYEXCHANGE), 512 << 16).unwrap();
    let bob_public = csp
        .export_key(bob, bob_pair, None, BlobType::PUBLICKEYBLOB, 0, 1024)
        .unwrap();
    let wrapping = csp.import_key(alice, &bob_public, None, 0).unwrap();

    // public blobs of exchange keys come back as signature keys
    assert_eq!(
        csp.get_key_param(alice, wrapping, KeyParam::AlgId, 4, 0).unwrap(),
        ParamValue::Dword(AlgId::RSA_SIGN.0)
    );
    assert!(matches!(
        csp.encrypt(alice, wrapping, None, true, 0, b"x", 64),
        Err(CspError::BadKey(_))
    ));

    let session = csp.gen_key(alice, AlgId::DES3, 0).unwrap();
    let key_bytes = plaintext_key(&mut csp, alice, session);
    let blob = csp
        .export_key(alice, session, Some(bob_pair), BlobType::SIMPLEBLOB, 0, 256)
        .unwrap();

    let unwrapped = csp.import_key(bob, &blob, Some(bob_pair), 0).unwrap();
    assert_eq!(plaintext_key(&mut csp, bob, unwrapped), key_bytes);
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn test_file_store_keeps_key_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let base = Some(provider_names::MS_DEF_PROV);

    let mut csp = provider_with(FileBackedKeysetStore::open(dir.path()).unwrap());
    let prov = csp.acquire_context(Some("bob"), CRYPT_NEWKEYSET, base).unwrap().unwrap();
    let pair = csp.gen_key(prov, AlgId(KeySpec::AT_SIGNATURE), 0).unwrap();
    let public = csp
        .export_key(prov, pair, None, BlobType::PUBLICKEYBLOB, 0, 1024)
        .unwrap();
    csp.release_context(prov, 0).unwrap();
    drop(csp);

    let mut csp = provider_with(FileBackedKeysetStore::open(dir.path()).unwrap());
    let prov = csp.acquire_context(Some("bob"), 0, base).unwrap().unwrap();
    let reloaded = csp.get_user_key(prov, KeySpec::AT_SIGNATURE).unwrap();
    let again = csp
        .export_key(prov, reloaded, None, BlobType::PUBLICKEYBLOB, 0, 1024)
        .unwrap();
    assert_eq!(public, again);

    let hash = csp.create_hash(prov, AlgId::MD5, None, 0).unwrap();
    csp.hash_data(prov, hash, b"still signs", 0).unwrap();
    let signature = csp.sign_hash(prov, hash, KeySpec::AT_SIGNATURE, 0, 64).unwrap();
    csp.verify_signature(prov, hash, &signature, reloaded, 0).unwrap();
}

#[test]
fn test_file_store_enumerates_containers() {
    let dir = tempfile::tempdir().unwrap();
    let mut csp = provider_with(FileBackedKeysetStore::open(dir.path()).unwrap());
    for name in ["first", "second"] {
        let prov = csp.acquire_context(Some(name), CRYPT_NEWKEYSET, None).unwrap().unwrap();
        csp.release_context(prov, 0).unwrap();
    }

    let prov = verify_context(&mut csp, provider_names::MS_STRONG_PROV);
    let mut names = Vec::new();
    let mut flags = CRYPT_FIRST;
    loop {
        match csp.get_prov_param(prov, ProvParam::EnumContainers, 256, flags) {
            Ok(ParamValue::Text(name)) => names.push(name),
            Ok(other) => panic!("unexpected value {other:?}"),
            Err(CspError::NoMoreItems) => break,
            Err(e) => panic!("enumeration failed: {e}"),
        }
        flags = 0;
    }
    names.sort();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);

    assert!(csp.acquire_context(Some("first"), CRYPT_DELETEKEYSET, None).unwrap().is_none());
    assert!(matches!(
        csp.acquire_context(Some("first"), 0, None),
        Err(CspError::KeysetNotFound(_))
    ));
}
