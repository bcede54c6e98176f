//! Error types for envelope encryption and key sealing.

use thiserror::Error;

/// Errors that can occur while encrypting, sealing or authorizing.
#[derive(Debug, Error)]
pub enum SealError {
    /// Key material of the wrong size or shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Malformed input other than keys (nonce length, truncated blob).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// AEAD tag mismatch: wrong key or tampered ciphertext.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The caller is not allowed to unseal under this policy.
    #[error("address {address} is not authorized for scope {scope_id}")]
    Unauthorized { scope_id: String, address: String },

    /// The authorization oracle could not be reached.
    #[error("authorization oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Encryption itself failed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] vaultline_core::CoreError),
}

/// Result type for seal operations.
pub type Result<T> = std::result::Result<T, SealError>;
