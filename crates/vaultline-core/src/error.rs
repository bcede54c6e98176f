//! Error types for Vaultline Core.

use serde::Serialize;
use thiserror::Error;

use crate::crypto::Sha256Hash;
use crate::types::EntryId;

/// Errors raised by core primitives on malformed input.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid length for {what}: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// A single reason a commit fails chain verification.
///
/// These are reported, never raised: a verification pass collects them per
/// commit and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "failure", content = "detail", rename_all = "snake_case")]
pub enum ChainFailure {
    #[error("merkle root mismatch: stored {stored}, computed {computed}")]
    RootMismatch {
        stored: Sha256Hash,
        computed: Sha256Hash,
    },

    #[error("referenced manifest entry {0} is missing")]
    MissingEntry(EntryId),

    #[error("manifest entry {0} belongs to another dataset")]
    ForeignEntry(EntryId),

    #[error("signature verification failed")]
    SignatureFailed,

    #[error("first commit has parent root {0}")]
    UnexpectedParent(Sha256Hash),

    #[error("commit after the first has no parent root")]
    MissingParent,

    #[error("parent root {0} matches no earlier commit")]
    UnknownParent(Sha256Hash),
}
