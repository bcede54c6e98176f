//! # Vaultline
//!
//! Tamper-evident version chains over encrypted, policy-gated datasets.
//!
//! ## Overview
//!
//! Vaultline answers two questions with cryptographic certainty:
//!
//! - **Has this dataset's history been altered?** Every version commit signs
//!   the Merkle root of its manifest entries and chains to the previous root.
//!   [`VersionChain::verify_chain`] re-derives all three properties for every
//!   commit and reports each outcome.
//! - **May this caller read this file?** File content is encrypted under a
//!   per-file key, and the key is sealed under a policy. Unsealing checks
//!   authorization before any decryption.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultline::{Signer, Vault, VaultConfig};
//! use vaultline::core::{Address, DatasetId, Keypair, Metadata};
//! use vaultline::seal::SealPolicy;
//! use vaultline::store::{MemoryBlobStore, SqliteStore};
//!
//! async fn example() -> vaultline::Result<()> {
//!     let store = Arc::new(SqliteStore::open("vault.db")?);
//!     let vault = Vault::new(store, Arc::new(MemoryBlobStore::new()), VaultConfig::default())
//!         .with_signer(Signer::Local(Keypair::generate()));
//!
//!     let dataset = DatasetId::new("reports")?;
//!     let alice = Address::new("0xalice")?;
//!     let policy = SealPolicy::new("team", [alice.clone()]);
//!
//!     let entry = vault
//!         .add_file(&dataset, Some("q3.csv"), b"revenue,42", Metadata::new(), &policy)
//!         .await?;
//!     vault.commit(&dataset, Some("alice".into()), None).await?;
//!
//!     assert!(vault.verify(&dataset).await?.valid);
//!     let plaintext = vault.read_file(&entry.id, &alice).await?;
//!     # let _ = plaintext;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vaultline::core` - Hashing, Merkle manifests, commits
//! - `vaultline::seal` - Envelope encryption and policy sealing
//! - `vaultline::store` - Persistence, blobs and key custody

pub mod chain;
pub mod config;
pub mod error;
pub mod vault;

pub use vaultline_core as core;
pub use vaultline_seal as seal;
pub use vaultline_store as store;

pub use chain::{CancelFlag, CommitSubmission, PreparedCommit, Signer, VersionChain};
pub use config::VaultConfig;
pub use error::{ErrorKind, Result, VaultError};
pub use vault::{ClonedDataset, EncryptionInfo, Vault, ENCRYPTION_KEY};

pub use vaultline_core::{
    ChainFailure, ChainReport, CommitCheck, DatasetId, EntryId, ManifestEntry, Sha256Hash,
    VersionCommit,
};
