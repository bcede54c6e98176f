//! Error types for Vaultline.
//!
//! Every failure falls into one of five categories, exposed through
//! [`VaultError::kind`] so callers can branch on policy without matching
//! every variant.

use thiserror::Error;

use vaultline_core::{CoreError, DatasetId, Sha256Hash};
use vaultline_seal::SealError;
use vaultline_store::StoreError;

/// The category of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input. Local, never retried.
    Validation,
    /// Signature or AEAD tag mismatch. Fails closed.
    Authentication,
    /// The policy denies the caller.
    Authorization,
    /// Lost a chain-append race. Re-read the head and retry.
    ConcurrentModification,
    /// A collaborator (oracle, store, blob backend) is unreachable.
    Dependency,
}

impl ErrorKind {
    /// Whether retrying the same operation can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ConcurrentModification | ErrorKind::Dependency
        )
    }
}

/// Errors that can occur during Vaultline operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The dataset has no pending entries.
    #[error("nothing to commit for dataset {0}")]
    NothingToCommit(DatasetId),

    /// No keystore is available for signing.
    #[error("no signing key available")]
    NoSigningKey,

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Signature, tag or chain verification failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The caller is not allowed.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The dataset head moved between read and append.
    #[error("concurrent modification of dataset {dataset_id}: expected head {expected:?}, found {current:?}")]
    ConcurrentModification {
        dataset_id: DatasetId,
        expected: Option<Sha256Hash>,
        current: Option<Sha256Hash>,
    },

    /// A collaborator is unreachable.
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl VaultError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Validation(_)
            | VaultError::NothingToCommit(_)
            | VaultError::NoSigningKey
            | VaultError::NotFound(_)
            | VaultError::Config(_) => ErrorKind::Validation,
            VaultError::Authentication(_) => ErrorKind::Authentication,
            VaultError::Authorization(_) => ErrorKind::Authorization,
            VaultError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            VaultError::Dependency(_) => ErrorKind::Dependency,
            VaultError::Store(e) => match e {
                StoreError::Database(_) | StoreError::Io(_) | StoreError::Poisoned(_) => {
                    ErrorKind::Dependency
                }
                StoreError::Serialization(_)
                | StoreError::NotFound(_)
                | StoreError::AlreadyExists(_)
                | StoreError::InvalidData(_)
                | StoreError::Migration(_)
                | StoreError::KeystoreExists(_) => ErrorKind::Validation,
            },
        }
    }

    /// Shorthand for `self.kind().is_retryable()`.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<SealError> for VaultError {
    fn from(e: SealError) -> Self {
        match e {
            SealError::Authentication(msg) => VaultError::Authentication(msg),
            e @ SealError::Unauthorized { .. } => VaultError::Authorization(e.to_string()),
            SealError::OracleUnavailable(msg) => VaultError::Dependency(msg),
            e @ (SealError::InvalidKey(_)
            | SealError::InvalidInput(_)
            | SealError::EncryptionError(_)
            | SealError::SerializationError(_)
            | SealError::CoreError(_)) => VaultError::Validation(e.to_string()),
        }
    }
}

impl From<CoreError> for VaultError {
    fn from(e: CoreError) -> Self {
        VaultError::Validation(e.to_string())
    }
}

/// Result type for Vaultline operations.
pub type Result<T> = std::result::Result<T, VaultError>;
