//! # Vaultline Core
//!
//! Pure primitives for Vaultline: hashing, signatures, Merkle manifests and
//! signed version commits.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`ManifestEntry`] - One blob reference plus metadata
//! - [`VersionCommit`] - A signed, chained snapshot of manifest entries
//! - [`Sha256Hash`] - Manifest roots and content digests
//! - [`ChainReport`] - Per-commit outcome of a chain audit
//!
//! ## Canonicalization
//!
//! Metadata and commit payloads are hashed and signed in canonical JSON. See
//! the [`canonical`] module.

pub mod canonical;
pub mod commit;
pub mod crypto;
pub mod error;
pub mod manifest;
pub mod merkle;
pub mod types;
pub mod validation;

pub use canonical::{canonical_json, canonical_metadata};
pub use commit::{CommitBuilder, SignablePayload, VersionCommit};
pub use crypto::{
    generate_keypair, hash, sign, verify, Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Hash,
};
pub use error::{ChainFailure, CoreError};
pub use manifest::{ManifestEntry, Metadata, MetadataValue};
pub use merkle::{compute_manifest_root, leaf_hash, verify_manifest_root, EMPTY_ROOT};
pub use types::{Address, BlobId, CommitId, DatasetId, EntryId};
pub use validation::{verify_chain, ChainReport, CommitCheck};

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
