//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use vaultline_core::{
    validation::sort_chain, CommitId, DatasetId, EntryId, ManifestEntry, Sha256Hash,
    VersionCommit,
};

use crate::error::{poisoned, Result, StoreError};
use crate::traits::{AppendResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Entries indexed by id. `BTreeMap` keeps them in id order.
    entries: BTreeMap<EntryId, ManifestEntry>,

    /// Commits indexed by id.
    commits: HashMap<CommitId, VersionCommit>,

    /// Per-dataset commit ids in append order. The last one is the head.
    chains: HashMap<DatasetId, Vec<CommitId>>,

    /// Entry ids referenced by any commit.
    referenced: HashSet<EntryId>,
}

impl MemoryStoreInner {
    fn head(&self, dataset: &DatasetId) -> Option<&VersionCommit> {
        self.chains
            .get(dataset)
            .and_then(|ids| ids.last())
            .and_then(|id| self.commits.get(id))
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_entry(&self, entry: &ManifestEntry) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.entries.contains_key(&entry.id) {
            return Err(StoreError::AlreadyExists(format!("entry {}", entry.id)));
        }
        inner.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<ManifestEntry>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.entries.get(id).cloned())
    }

    async fn get_entries(&self, ids: &[EntryId]) -> Result<Vec<ManifestEntry>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.entries.get(id).cloned())
            .collect())
    }

    async fn pending_entries(&self, dataset: &DatasetId) -> Result<Vec<ManifestEntry>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .entries
            .values()
            .filter(|e| &e.dataset_id == dataset && !inner.referenced.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn latest_commit(&self, dataset: &DatasetId) -> Result<Option<VersionCommit>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.head(dataset).cloned())
    }

    async fn list_commits(&self, dataset: &DatasetId) -> Result<Vec<VersionCommit>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut commits: Vec<VersionCommit> = inner
            .chains
            .get(dataset)
            .map(|ids| ids.iter().filter_map(|id| inner.commits.get(id).cloned()).collect())
            .unwrap_or_default();
        sort_chain(&mut commits);
        Ok(commits)
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Option<VersionCommit>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.commits.get(id).cloned())
    }

    async fn append_commit(
        &self,
        commit: &VersionCommit,
        expected_parent: Option<&Sha256Hash>,
    ) -> Result<AppendResult> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let current = inner.head(&commit.dataset_id).map(|c| c.version_root);
        if current.as_ref() != expected_parent {
            return Ok(AppendResult::ParentMismatch { current });
        }
        if inner.commits.contains_key(&commit.id) {
            return Err(StoreError::AlreadyExists(format!("commit {}", commit.id)));
        }

        inner.referenced.extend(commit.manifest_entry_ids.iter().cloned());
        inner
            .chains
            .entry(commit.dataset_id.clone())
            .or_default()
            .push(commit.id.clone());
        inner.commits.insert(commit.id.clone(), commit.clone());

        Ok(AppendResult::Appended)
    }

    async fn replace_commit(&self, commit: &VersionCommit) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let Some(old) = inner.commits.get(&commit.id) else {
            return Err(StoreError::NotFound(format!("commit {}", commit.id)));
        };
        if old.dataset_id != commit.dataset_id {
            return Err(StoreError::InvalidData(format!(
                "commit {} cannot move to another dataset",
                commit.id
            )));
        }

        inner.commits.insert(commit.id.clone(), commit.clone());
        let referenced: HashSet<EntryId> = inner
            .commits
            .values()
            .flat_map(|c| c.manifest_entry_ids.iter().cloned())
            .collect();
        inner.referenced = referenced;
        Ok(())
    }
}
