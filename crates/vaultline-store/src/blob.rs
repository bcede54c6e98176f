//! Blob storage seam.
//!
//! Blobs are opaque ciphertext addressed by a content identifier. Backends
//! are assumed eventually consistent; retrying transient failures is the
//! caller's business.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use vaultline_core::{hash, BlobId};

use crate::error::{poisoned, Result, StoreError};

/// Upload, download and delete opaque blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return its content identifier.
    async fn put(&self, bytes: Bytes) -> Result<BlobId>;

    /// Fetch a blob. `None` if the store does not have it.
    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>>;

    /// Delete a blob. Returns whether it existed.
    async fn delete(&self, id: &BlobId) -> Result<bool>;
}

/// In-memory blob store addressed by SHA-256 hex of the content.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> Result<usize> {
        Ok(self.blobs.read().map_err(poisoned)?.len())
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<BlobId> {
        let id = BlobId::new(hash(&bytes).to_hex())
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        self.blobs.write().map_err(poisoned)?.insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>> {
        Ok(self.blobs.read().map_err(poisoned)?.get(id).cloned())
    }

    async fn delete(&self, id: &BlobId) -> Result<bool> {
        Ok(self.blobs.write().map_err(poisoned)?.remove(id).is_some())
    }
}
