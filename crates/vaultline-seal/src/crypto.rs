//! Symmetric key material.
//!
//! File keys and master keys are 256-bit and wiped from memory on drop.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SealError};

/// Length of every symmetric key in this crate.
pub const KEY_LEN: usize = 32;

fn random_key() -> [u8; KEY_LEN] {
    let mut bytes = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn key_from_slice(bytes: &[u8], what: &str) -> Result<[u8; KEY_LEN]> {
    bytes.try_into().map_err(|_| {
        SealError::InvalidKey(format!(
            "{what} must be {KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

/// A per-file content key. Never persisted in plaintext.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct FileKey([u8; KEY_LEN]);

impl FileKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        key_from_slice(bytes, "file key").map(Self)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

/// A root master key from which per-file keys can be derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        key_from_slice(bytes, "master key").map(Self)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Derive the key for `file_id`. See [`derive_file_key_from_rmk`].
    pub fn derive_file_key(&self, file_id: &str) -> FileKey {
        derive_file_key_from_rmk(self, file_id)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Generate a fresh random file key.
pub fn generate_file_key() -> FileKey {
    FileKey::generate()
}

/// Deterministically derive a per-file key: `SHA-256(master_key || file_id)`.
///
/// This is a plain hash, not HKDF, and carries no domain-separation label.
/// Keys derived this way must not be reused for any other purpose.
pub fn derive_file_key_from_rmk(master: &MasterKey, file_id: &str) -> FileKey {
    let mut hasher = Sha256::new();
    hasher.update(master.as_bytes());
    hasher.update(file_id.as_bytes());
    FileKey(hasher.finalize().into())
}
