//! # Vaultline Store
//!
//! Storage seams for Vaultline: manifest and commit persistence, blob
//! storage, and custody of the signing key.
//!
//! ## Key Types
//!
//! - [`Store`] - Async persistence of manifest entries and version commits
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`BlobStore`] / [`MemoryBlobStore`] - Content-addressed ciphertext blobs
//! - [`KeyCustody`] / [`FileKeyCustody`] - The single local signing identity
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultline_store::{SqliteStore, Store};
//! use vaultline_core::DatasetId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     let dataset = DatasetId::new("photos").unwrap();
//!     let head = store.latest_commit(&dataset).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Compare-and-append**: [`Store::append_commit`] only succeeds if the
//!   dataset head is still the parent the caller signed over
//! - **Pending entries**: entries stay pending until a commit references them
//! - **No silent key rotation**: [`KeyCustody::save`] refuses to overwrite

pub mod blob;
pub mod error;
pub mod keystore;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use blob::{BlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use keystore::{FileKeyCustody, KeyCustody, Keystore, MemoryKeyCustody};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, Store};
