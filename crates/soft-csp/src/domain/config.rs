//! Provider configuration and validation.
//!
//! # Example
//!
//! ```ignore
//! use soft_csp::ProviderConfig;
//!
//! let config = ProviderConfig::default()
//!     .with_default_container("alice")
//!     .with_max_handles(256);
//! config.validate().expect("valid config");
//! ```

use thiserror::Error;

/// Smallest RSA public exponent accepted.
const MIN_PUBLIC_EXPONENT: u32 = 3;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Default container name must not be empty")]
    EmptyDefaultContainer,

    #[error("RSA public exponent must be odd and at least {MIN_PUBLIC_EXPONENT}, got {0}")]
    InvalidPublicExponent(u32),

    #[error("Handle capacity must be non-zero")]
    ZeroHandleCapacity,
}

/// Provider configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "file-store", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderConfig {
    /// Container name used when acquire is given an empty name
    pub default_container: String,
    /// Open containers in the machine scope unless told otherwise
    pub machine_keyset_default: bool,
    /// Write long-term keys to the store when a container is released
    pub persist_on_release: bool,
    /// Public exponent for generated RSA pairs
    pub rsa_public_exponent: u32,
    /// Maximum live handles per registry (containers, keys, hashes)
    pub max_handles: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_container: "default".to_string(),
            machine_keyset_default: false,
            persist_on_release: true,
            rsa_public_exponent: 65537,
            max_handles: 4096,
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_container.is_empty() {
            return Err(ConfigError::EmptyDefaultContainer);
        }
        if self.rsa_public_exponent < MIN_PUBLIC_EXPONENT || self.rsa_public_exponent % 2 == 0 {
            return Err(ConfigError::InvalidPublicExponent(self.rsa_public_exponent));
        }
        if self.max_handles == 0 {
            return Err(ConfigError::ZeroHandleCapacity);
        }
        Ok(())
    }

    pub fn with_default_container(mut self, name: impl Into<String>) -> Self {
        self.default_container = name.into();
        self
    }

    pub fn with_machine_keyset_default(mut self, machine: bool) -> Self {
        self.machine_keyset_default = machine;
        self
    }

    pub fn with_persist_on_release(mut self, persist: bool) -> Self {
        self.persist_on_release = persist;
        self
    }

    pub fn with_rsa_public_exponent(mut self, exponent: u32) -> Self {
        self.rsa_public_exponent = exponent;
        self
    }

    pub fn with_max_handles(mut self, max: usize) -> Self {
        self.max_handles = max;
        self
    }
}
