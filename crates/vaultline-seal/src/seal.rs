//! Policy-gated sealing of file keys.
//!
//! A key is sealed under a symmetric key derived from its policy:
//!
//! ```text
//! sealing_key = SHA-256(scope_id || join(sorted(allowed_addresses), ","))
//! sealed_blob = iv(12) || AES-256-GCM(sealing_key, iv, key) || tag(16)
//! ```
//!
//! Anyone who knows the policy can derive the sealing key, so possession of
//! a sealed blob proves nothing. Authorization is enforced by [`PolicySeal`]
//! before any decryption is attempted. Revoking an address means resealing
//! under a new policy; blobs sealed under the old policy stay openable by
//! whoever holds them. Per-recipient key wrapping would replace this scheme.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use vaultline_core::Address;

use crate::crypto::{FileKey, KEY_LEN};
use crate::error::{Result, SealError};
use crate::oracle::AuthorizationOracle;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Who may unseal: a scope plus an explicit address list.
///
/// Not secret. Stored next to the sealed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealPolicy {
    pub scope_id: String,
    pub allowed_addresses: BTreeSet<Address>,
}

impl SealPolicy {
    /// Create a policy.
    pub fn new(scope_id: impl Into<String>, addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            scope_id: scope_id.into(),
            allowed_addresses: addresses.into_iter().collect(),
        }
    }

    /// Whether the embedded list contains `address`.
    pub fn allows(&self, address: &Address) -> bool {
        self.allowed_addresses.contains(address)
    }

    /// Derive the symmetric sealing key for this policy.
    fn sealing_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        // BTreeSet iterates in sorted order.
        let joined = self
            .allowed_addresses
            .iter()
            .map(Address::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let mut hasher = Sha256::new();
        hasher.update(self.scope_id.as_bytes());
        hasher.update(joined.as_bytes());
        Zeroizing::new(hasher.finalize().into())
    }
}

/// The only persisted form of a file key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedKey {
    pub sealed_blob: Vec<u8>,
    pub policy: SealPolicy,
}

impl SealedKey {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SealError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SealError::SerializationError(e.to_string()))
    }

    /// CBOR bytes as lowercase hex.
    pub fn to_hex(&self) -> Result<String> {
        self.to_bytes().map(hex::encode)
    }

    /// Parse from the hex form of [`SealedKey::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| SealError::SerializationError(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Seal `key` under `policy`. Pure; consults no oracle.
pub fn seal_key(key: &FileKey, policy: &SealPolicy) -> Result<SealedKey> {
    let sealing_key = policy.sealing_key();
    let cipher = Aes256Gcm::new_from_slice(sealing_key.as_slice())
        .map_err(|e| SealError::InvalidKey(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), key.as_bytes().as_slice())
        .map_err(|e| SealError::EncryptionError(e.to_string()))?;

    let mut sealed_blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    sealed_blob.extend_from_slice(&iv);
    sealed_blob.extend_from_slice(&ciphertext);

    Ok(SealedKey {
        sealed_blob,
        policy: policy.clone(),
    })
}

/// Decrypt a sealed blob. Callers must have authorized first.
fn open_sealed(sealed_blob: &[u8], policy: &SealPolicy) -> Result<FileKey> {
    if sealed_blob.len() < IV_LEN + TAG_LEN {
        return Err(SealError::InvalidInput(format!(
            "sealed blob too short: {} bytes",
            sealed_blob.len()
        )));
    }
    let (iv, ciphertext) = sealed_blob.split_at(IV_LEN);

    let sealing_key = policy.sealing_key();
    let cipher = Aes256Gcm::new_from_slice(sealing_key.as_slice())
        .map_err(|e| SealError::InvalidKey(e.to_string()))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| SealError::Authentication("sealed key tag mismatch".into()))?,
    );
    FileKey::from_slice(&plaintext)
}

/// Oracle timeout and fallback behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealConfig {
    /// Applied to every oracle call. Expiry counts as unreachable.
    pub oracle_timeout: Duration,
    /// Whether reads may fall back to the embedded address list when the
    /// oracle is unreachable.
    pub allow_policy_fallback: bool,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_millis(5_000),
            allow_policy_fallback: true,
        }
    }
}

/// How an access decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The oracle answered.
    Oracle,
    /// No oracle is configured; the embedded list is authoritative.
    Policy,
    /// The oracle was unreachable; degraded trust.
    PolicyFallback,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub mode: AccessMode,
}

/// Authorization-first unsealing.
#[derive(Clone)]
pub struct PolicySeal {
    oracle: Option<Arc<dyn AuthorizationOracle>>,
    config: SealConfig,
}

impl PolicySeal {
    /// A seal that trusts only the embedded address lists.
    pub fn policy_only(config: SealConfig) -> Self {
        Self {
            oracle: None,
            config,
        }
    }

    /// A seal that consults `oracle` before every unseal.
    pub fn with_oracle(oracle: Arc<dyn AuthorizationOracle>, config: SealConfig) -> Self {
        Self {
            oracle: Some(oracle),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Seal `key` under `policy`.
    pub fn seal_key(&self, key: &FileKey, policy: &SealPolicy) -> Result<SealedKey> {
        seal_key(key, policy)
    }

    /// Decide whether `address` may unseal under `policy`.
    ///
    /// Errors only when the oracle is unreachable and fallback is disabled.
    pub async fn authorize(&self, policy: &SealPolicy, address: &Address) -> Result<AccessDecision> {
        let Some(oracle) = &self.oracle else {
            return Ok(AccessDecision {
                allowed: policy.allows(address),
                mode: AccessMode::Policy,
            });
        };

        let lookup = oracle.is_member(&policy.scope_id, address);
        let reason = match tokio::time::timeout(self.config.oracle_timeout, lookup).await {
            Ok(Ok(allowed)) => {
                debug!(scope_id = %policy.scope_id, %address, allowed, "oracle decision");
                return Ok(AccessDecision {
                    allowed,
                    mode: AccessMode::Oracle,
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {:?}", self.config.oracle_timeout),
        };

        warn!(scope_id = %policy.scope_id, %address, %reason, "authorization oracle unreachable");
        if !self.config.allow_policy_fallback {
            return Err(SealError::OracleUnavailable(reason));
        }

        let allowed = policy.allows(address);
        warn!(
            scope_id = %policy.scope_id,
            %address,
            allowed,
            "degraded trust: authorized from embedded policy list"
        );
        Ok(AccessDecision {
            allowed,
            mode: AccessMode::PolicyFallback,
        })
    }

    /// Whether `address` may unseal under `policy`. Unreachable counts as no.
    pub async fn can_unseal(&self, policy: &SealPolicy, address: &Address) -> bool {
        self.authorize(policy, address)
            .await
            .map(|d| d.allowed)
            .unwrap_or(false)
    }

    /// Authorize `caller`, then decrypt the sealed blob.
    ///
    /// A denied caller never reaches decryption.
    pub async fn unseal_key(
        &self,
        sealed_blob: &[u8],
        policy: &SealPolicy,
        caller: &Address,
    ) -> Result<FileKey> {
        let decision = self.authorize(policy, caller).await?;
        if !decision.allowed {
            return Err(SealError::Unauthorized {
                scope_id: policy.scope_id.clone(),
                address: caller.to_string(),
            });
        }
        open_sealed(sealed_blob, policy)
    }

    /// [`PolicySeal::unseal_key`] with the policy stored alongside the blob.
    pub async fn unseal(&self, sealed: &SealedKey, caller: &Address) -> Result<FileKey> {
        self.unseal_key(&sealed.sealed_blob, &sealed.policy, caller)
            .await
    }
}

impl std::fmt::Debug for PolicySeal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySeal")
            .field("oracle", &self.oracle.is_some())
            .field("config", &self.config)
            .finish()
    }
}
