//! Vault configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vaultline_seal::SealConfig;

use crate::error::{Result, VaultError};

/// Configuration for a [`Vault`](crate::Vault) and its
/// [`VersionChain`](crate::VersionChain).
///
/// Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Timeout for each authorization-oracle call, in milliseconds.
    pub oracle_timeout_ms: u64,
    /// Whether reads may fall back to the embedded address list when the
    /// oracle is unreachable.
    pub allow_policy_fallback: bool,
    /// Refuse to decrypt entries whose committing version fails verification.
    pub verify_before_read: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: 5_000,
            allow_policy_fallback: true,
            verify_before_read: false,
        }
    }
}

impl VaultConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// The seal-layer view of this configuration.
    pub fn seal_config(&self) -> SealConfig {
        SealConfig {
            oracle_timeout: Duration::from_millis(self.oracle_timeout_ms),
            allow_policy_fallback: self.allow_policy_fallback,
        }
    }
}
