//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use vaultline_core::{
    compute_manifest_root, Address, BlobId, CommitBuilder, DatasetId, Ed25519PublicKey, Keypair,
    ManifestEntry, VersionCommit,
};
use vaultline_seal::{SealPolicy, StaticOracle};
use vaultline_store::{MemoryBlobStore, MemoryStore, Store};

/// Timestamp of the first commit made by [`TestFixture::make_commit`].
pub const GENESIS_MILLIS: i64 = 1_736_870_400_000;

/// A keypair, memory stores and a static oracle, scoped to one dataset.
pub struct TestFixture {
    pub keypair: Keypair,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub oracle: Arc<StaticOracle>,
    pub dataset: DatasetId,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self::with_keypair(Keypair::generate())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_keypair(Keypair::from_seed(&seed))
    }

    fn with_keypair(keypair: Keypair) -> Self {
        Self {
            keypair,
            store: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            oracle: Arc::new(StaticOracle::new()),
            dataset: DatasetId::new("fixture").expect("literal id is non-empty"),
        }
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Parse an address, panicking on malformed input.
    pub fn address(&self, address: &str) -> Address {
        Address::new(address).expect("valid test address")
    }

    /// A policy over `addresses` in `scope`.
    pub fn policy(&self, scope: &str, addresses: &[&str]) -> SealPolicy {
        SealPolicy::new(scope, addresses.iter().map(|a| self.address(a)))
    }

    /// An unsaved entry of the fixture dataset.
    pub fn make_entry(&self, blob: &str, path: Option<&str>) -> ManifestEntry {
        let mut entry = ManifestEntry::new(
            self.dataset.clone(),
            BlobId::new(blob).expect("non-empty blob id"),
        );
        entry.path = path.map(str::to_string);
        entry
    }

    /// Create an entry and insert it into the store as pending.
    pub async fn stage(&self, blob: &str, path: Option<&str>) -> ManifestEntry {
        let entry = self.make_entry(blob, path);
        self.store
            .insert_entry(&entry)
            .await
            .expect("insert into memory store");
        entry
    }

    /// A signed commit over `entries`, chained to `parent` if given.
    ///
    /// Not stored. Timestamps start at [`GENESIS_MILLIS`] and step by one
    /// millisecond per parent.
    pub fn make_commit(
        &self,
        entries: &[ManifestEntry],
        parent: Option<&VersionCommit>,
    ) -> VersionCommit {
        CommitBuilder::new(self.dataset.clone(), compute_manifest_root(entries))
            .parent(parent.map(|p| p.version_root))
            .timestamp(parent.map_or(GENESIS_MILLIS, |p| p.created_at + 1))
            .entries(entries.iter().map(|e| e.id.clone()).collect())
            .sign(&self.keypair)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}
