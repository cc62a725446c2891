//! # Provider Errors
//!
//! Error kinds returned by every provider operation.
//!
//! Each kind maps onto one classic numeric status code (see [`CspError::code`])
//! so that a binding layer can report the same value a native provider would.

use thiserror::Error;

/// Classic numeric status codes.
pub mod status {
    pub const NTE_BAD_UID: u32 = 0x8009_0001;
    pub const NTE_BAD_HASH: u32 = 0x8009_0002;
    pub const NTE_BAD_KEY: u32 = 0x8009_0003;
    pub const NTE_BAD_LEN: u32 = 0x8009_0004;
    pub const NTE_BAD_DATA: u32 = 0x8009_0005;
    pub const NTE_BAD_SIGNATURE: u32 = 0x8009_0006;
    pub const NTE_BAD_ALGID: u32 = 0x8009_0008;
    pub const NTE_BAD_FLAGS: u32 = 0x8009_0009;
    pub const NTE_BAD_TYPE: u32 = 0x8009_000A;
    pub const NTE_BAD_KEY_STATE: u32 = 0x8009_000B;
    pub const NTE_BAD_HASH_STATE: u32 = 0x8009_000C;
    pub const NTE_NO_KEY: u32 = 0x8009_000D;
    pub const NTE_NO_MEMORY: u32 = 0x8009_000E;
    pub const NTE_EXISTS: u32 = 0x8009_000F;
    pub const NTE_BAD_PUBLIC_KEY: u32 = 0x8009_0015;
    pub const NTE_BAD_KEYSET: u32 = 0x8009_0016;
    pub const NTE_FAIL: u32 = 0x8009_0020;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const ERROR_NO_MORE_ITEMS: u32 = 259;
}

/// Which registry a rejected handle was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Container,
    Key,
    Hash,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleKind::Container => write!(f, "container"),
            HandleKind::Key => write!(f, "key"),
            HandleKind::Hash => write!(f, "hash"),
        }
    }
}

/// Errors produced by provider operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CspError {
    /// Unknown, stale or wrong-type handle.
    #[error("Invalid {0} handle")]
    BadHandle(HandleKind),

    /// Algorithm id unsupported by the personality, or a mode/class mismatch.
    #[error("Unsupported algorithm: {0:#06x}")]
    BadAlgorithm(u32),

    /// Unsupported or reserved flag bits, or a key length outside the table bounds.
    #[error("Invalid flags: {0:#010x}")]
    BadFlags(u32),

    /// Key object is in a state that forbids the operation.
    #[error("Key is in the wrong state for this operation")]
    BadKeyState,

    /// Hash object is in a state that forbids the operation.
    #[error("Hash is in the wrong state for this operation")]
    BadHashState,

    /// Malformed input: bad padding, truncated blob, misaligned block data.
    #[error("Bad data: {0}")]
    BadData(&'static str),

    /// Input too long for the padding scheme.
    #[error("Data length exceeds the available padding space")]
    BadLength,

    /// Caller buffer too small; retry with `required` bytes.
    #[error("Buffer too small, {required} bytes required")]
    MoreData { required: usize },

    /// Signature did not verify.
    #[error("Signature verification failed")]
    BadSignature,

    /// Key unusable for the requested operation.
    #[error("Key cannot be used here: {0}")]
    BadKey(&'static str),

    /// Export target is not a usable public key.
    #[error("Invalid public key")]
    BadPublicKey,

    /// Unknown parameter or blob type.
    #[error("Unsupported type: {0}")]
    BadType(u32),

    /// The requested long-term key slot is empty.
    #[error("No key bound in the requested slot")]
    NoKey,

    /// The handle registry is full.
    #[error("Out of handle space")]
    NoMemory,

    /// A container with that name already exists.
    #[error("Keyset already exists: {0}")]
    AlreadyExists(String),

    /// No container with that name.
    #[error("Keyset not found: {0}")]
    KeysetNotFound(String),

    /// Reserved argument was non-zero.
    #[error("Invalid parameter")]
    InvalidParameter,

    /// Enumeration cursor is exhausted.
    #[error("No more items")]
    NoMoreItems,

    /// Generic failure reported by a collaborator.
    #[error("Operation failed: {0}")]
    Failure(String),

    /// Keyset persistence failed.
    #[error("Keyset store error: {0}")]
    Store(String),
}

impl CspError {
    /// Numeric status code for this error.
    pub fn code(&self) -> u32 {
        use status::*;
        match self {
            CspError::BadHandle(HandleKind::Container) => NTE_BAD_UID,
            CspError::BadHandle(HandleKind::Key) => NTE_BAD_KEY,
            CspError::BadHandle(HandleKind::Hash) => NTE_BAD_HASH,
            CspError::BadAlgorithm(_) => NTE_BAD_ALGID,
            CspError::BadFlags(_) => NTE_BAD_FLAGS,
            CspError::BadKeyState => NTE_BAD_KEY_STATE,
            CspError::BadHashState => NTE_BAD_HASH_STATE,
            CspError::BadData(_) => NTE_BAD_DATA,
            CspError::BadLength => NTE_BAD_LEN,
            CspError::MoreData { .. } => ERROR_MORE_DATA,
            CspError::BadSignature => NTE_BAD_SIGNATURE,
            CspError::BadKey(_) => NTE_BAD_KEY,
            CspError::BadPublicKey => NTE_BAD_PUBLIC_KEY,
            CspError::BadType(_) => NTE_BAD_TYPE,
            CspError::NoKey => NTE_NO_KEY,
            CspError::NoMemory => NTE_NO_MEMORY,
            CspError::AlreadyExists(_) => NTE_EXISTS,
            CspError::KeysetNotFound(_) => NTE_BAD_KEYSET,
            CspError::InvalidParameter => ERROR_INVALID_PARAMETER,
            CspError::NoMoreItems => ERROR_NO_MORE_ITEMS,
            CspError::Failure(_) | CspError::Store(_) => NTE_FAIL,
        }
    }

    /// True for both key and hash state violations.
    pub fn is_bad_state(&self) -> bool {
        matches!(self, CspError::BadKeyState | CspError::BadHashState)
    }
}

/// Result alias used across the crate.
pub type CspResult<T> = Result<T, CspError>;

/// Errors reported by a keyset store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Keyset not found: {0}")]
    NotFound(String),

    #[error("Keyset already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt keyset document: {0}")]
    Corrupt(String),

    #[error("Keyset store locked: {0}")]
    Locked(String),
}

impl From<StoreError> for CspError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => CspError::KeysetNotFound(name),
            StoreError::AlreadyExists(name) => CspError::AlreadyExists(name),
            other => CspError::Store(other.to_string()),
        }
    }
}
