//! # Vaultline Testkit
//!
//! Testing utilities for Vaultline.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed inputs with pinned hashes and signatures, so
//!   any implementation of the leaf encoding and commit payload can be
//!   checked byte for byte
//! - **Generators**: Proptest strategies for entries and metadata
//! - **Fixtures**: A keypair plus memory-backed stores and oracle
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vaultline_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, actual) in verify_all_vectors() {
//!     assert!(ok, "{name}: got {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vaultline_testkit::generators::manifest_entries;
//!
//! proptest! {
//!     #[test]
//!     fn root_is_deterministic(entries in manifest_entries(8)) {
//!         prop_assert_eq!(compute_manifest_root(&entries), compute_manifest_root(&entries));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use vaultline_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let entry = fixture.make_entry("blob-1", Some("a.txt"));
//! let commit = fixture.make_commit(&[entry], None);
//! assert!(commit.verify_signature());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture};
pub use generators::{entry_from_params, EntryParams};
pub use vectors::{all_vectors, golden_entries, verify_all_vectors, GoldenVector};
