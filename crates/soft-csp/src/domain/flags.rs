//! Flag and parameter constants shared with the classic provider interface.

// Acquire
pub const CRYPT_VERIFYCONTEXT: u32 = 0xF000_0000;
pub const CRYPT_NEWKEYSET: u32 = 0x0000_0008;
pub const CRYPT_DELETEKEYSET: u32 = 0x0000_0010;
pub const CRYPT_MACHINE_KEYSET: u32 = 0x0000_0020;
pub const CRYPT_SILENT: u32 = 0x0000_0040;

// Key creation
pub const CRYPT_EXPORTABLE: u32 = 0x0000_0001;
pub const CRYPT_USER_PROTECTED: u32 = 0x0000_0002;
pub const CRYPT_CREATE_SALT: u32 = 0x0000_0004;
pub const CRYPT_NO_SALT: u32 = 0x0000_0010;
pub const CRYPT_SERVER: u32 = 0x0000_0400;

// Permissions
pub const CRYPT_ENCRYPT: u32 = 0x0001;
pub const CRYPT_DECRYPT: u32 = 0x0002;
pub const CRYPT_EXPORT: u32 = 0x0004;
pub const CRYPT_READ: u32 = 0x0008;
pub const CRYPT_WRITE: u32 = 0x0010;
pub const CRYPT_MAC: u32 = 0x0020;

// Cipher modes
pub const CRYPT_MODE_CBC: u32 = 1;
pub const CRYPT_MODE_ECB: u32 = 2;
pub const CRYPT_MODE_OFB: u32 = 3;
pub const CRYPT_MODE_CFB: u32 = 4;
pub const CRYPT_MODE_CTS: u32 = 5;

// Padding / signature
pub const CRYPT_NOHASHOID: u32 = 0x0000_0001;
pub const CRYPT_SSL2_FALLBACK: u32 = 0x0000_0002;
pub const CRYPT_X931_FORMAT: u32 = 0x0000_0004;

// Hash session key
pub const CRYPT_LITTLE_ENDIAN: u32 = 0x0000_0001;

// Enumeration
pub const CRYPT_FIRST: u32 = 1;

// SChannel algorithm use
pub const SCHANNEL_MAC_KEY: u32 = 0;
pub const SCHANNEL_ENC_KEY: u32 = 1;

// Provider implementation
pub const CRYPT_IMPL_SOFTWARE: u32 = 2;
pub const PROVIDER_VERSION: u32 = 0x0200;
pub const KEYSIZE_INCREMENT: u32 = 8;
