//! Store traits: the abstract interface for manifest and commit persistence.
//!
//! These traits keep the version chain storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use vaultline_core::{CommitId, DatasetId, EntryId, ManifestEntry, Sha256Hash, VersionCommit};

use crate::error::Result;

/// Result of a compare-and-append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// The commit is now the head of its dataset.
    Appended,
    /// The head moved since the caller read it. Nothing was written.
    ParentMismatch {
        /// Root of the current head, `None` if the dataset has no commits.
        current: Option<Sha256Hash>,
    },
}

/// Async interface for manifest entry and version commit persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **Immutable records**: inserting an entry or commit id twice is an
///   `AlreadyExists` error.
/// - **Append-only chains**: the only way to move a dataset's head is
///   [`Store::append_commit`], which is an atomic compare-and-append against
///   the current head root.
/// - **Pending entries**: an entry is pending until a commit references it.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Manifest Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new manifest entry.
    async fn insert_entry(&self, entry: &ManifestEntry) -> Result<()>;

    /// Get an entry by id.
    async fn get_entry(&self, id: &EntryId) -> Result<Option<ManifestEntry>>;

    /// Get the entries that exist among `ids`. Missing ids are skipped.
    async fn get_entries(&self, ids: &[EntryId]) -> Result<Vec<ManifestEntry>>;

    /// Entries of `dataset` not referenced by any commit, ordered by id.
    async fn pending_entries(&self, dataset: &DatasetId) -> Result<Vec<ManifestEntry>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Version Commits
    // ─────────────────────────────────────────────────────────────────────────

    /// The head of `dataset`: the most recently appended commit.
    async fn latest_commit(&self, dataset: &DatasetId) -> Result<Option<VersionCommit>>;

    /// All commits of `dataset`, ordered by `created_at` then id.
    async fn list_commits(&self, dataset: &DatasetId) -> Result<Vec<VersionCommit>>;

    /// Get a commit by id.
    async fn get_commit(&self, id: &CommitId) -> Result<Option<VersionCommit>>;

    /// Append `commit` if the dataset head root still equals
    /// `expected_parent` (`None` meaning "no commits yet").
    ///
    /// The check and the write are one atomic step.
    async fn append_commit(
        &self,
        commit: &VersionCommit,
        expected_parent: Option<&Sha256Hash>,
    ) -> Result<AppendResult>;

    /// Overwrite a stored commit in place, keeping its chain position.
    ///
    /// Repair and tamper-simulation hook; never used on the commit path.
    async fn replace_commit(&self, commit: &VersionCommit) -> Result<()>;
}
