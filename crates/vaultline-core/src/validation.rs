//! Chain verification: Merkle, signature, and parent-link checks per commit.
//!
//! Every commit is checked independently and every failure is recorded.
//! Detecting an inconsistency is a normal outcome, reported in a
//! [`ChainReport`], never an error.

use serde::Serialize;
use std::collections::HashMap;

use crate::commit::VersionCommit;
use crate::crypto::Sha256Hash;
use crate::error::ChainFailure;
use crate::manifest::ManifestEntry;
use crate::merkle::compute_manifest_root;
use crate::types::{CommitId, DatasetId, EntryId};

/// Outcome of verifying one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCheck {
    pub commit_id: CommitId,
    pub version_root: Sha256Hash,
    pub merkle_valid: bool,
    pub signature_valid: bool,
    pub parent_link_valid: bool,
    pub failures: Vec<ChainFailure>,
}

impl CommitCheck {
    /// True when all three properties hold.
    pub fn is_valid(&self) -> bool {
        self.merkle_valid && self.signature_valid && self.parent_link_valid
    }
}

/// Full audit of one dataset's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub dataset_id: DatasetId,
    /// All commits checked and every check passed.
    pub valid: bool,
    /// Number of commits in the chain, checked or not.
    pub version_count: usize,
    /// Per-commit outcomes in creation order.
    pub commits: Vec<CommitCheck>,
    /// False if verification was cancelled before the last commit.
    pub complete: bool,
}

impl ChainReport {
    /// Assemble a report from per-commit checks.
    pub fn new(
        dataset_id: DatasetId,
        version_count: usize,
        commits: Vec<CommitCheck>,
        complete: bool,
    ) -> Self {
        let valid = complete && commits.iter().all(CommitCheck::is_valid);
        Self {
            dataset_id,
            valid,
            version_count,
            commits,
            complete,
        }
    }

    /// The check for a given commit, if it was reached.
    pub fn check(&self, commit_id: &CommitId) -> Option<&CommitCheck> {
        self.commits.iter().find(|c| &c.commit_id == commit_id)
    }
}

/// Order commits by creation time, ties broken by id.
pub fn sort_chain(commits: &mut [VersionCommit]) {
    commits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Check that `commit`'s root is the root of exactly the entries it names.
///
/// `entries` holds whatever the store returned for the commit's ids; any id
/// without a matching entry of the same dataset fails the check.
pub fn check_merkle(commit: &VersionCommit, entries: &[ManifestEntry]) -> Vec<ChainFailure> {
    let by_id: HashMap<&EntryId, &ManifestEntry> = entries.iter().map(|e| (&e.id, e)).collect();
    let mut failures = Vec::new();
    let mut resolved = Vec::with_capacity(commit.manifest_entry_ids.len());

    for id in &commit.manifest_entry_ids {
        match by_id.get(id) {
            None => failures.push(ChainFailure::MissingEntry(id.clone())),
            Some(entry) if entry.dataset_id != commit.dataset_id => {
                failures.push(ChainFailure::ForeignEntry(id.clone()))
            }
            Some(entry) => resolved.push((*entry).clone()),
        }
    }
    if !failures.is_empty() {
        return failures;
    }

    let computed = compute_manifest_root(&resolved);
    if computed != commit.version_root {
        failures.push(ChainFailure::RootMismatch {
            stored: commit.version_root,
            computed,
        });
    }
    failures
}

/// Check the stored signature over the commit's own fields.
pub fn check_signature(commit: &VersionCommit) -> Option<ChainFailure> {
    if commit.verify_signature() {
        None
    } else {
        Some(ChainFailure::SignatureFailed)
    }
}

/// Check the parent link of `chain[index]`.
///
/// `chain` must be in creation order (see [`sort_chain`]). The first commit
/// must have no parent; every later commit must name the root of a different
/// commit created strictly earlier.
pub fn check_parent_link(chain: &[VersionCommit], index: usize) -> Option<ChainFailure> {
    let commit = &chain[index];
    match (index, &commit.parent_root) {
        (0, None) => None,
        (0, Some(parent)) => Some(ChainFailure::UnexpectedParent(*parent)),
        (_, None) => Some(ChainFailure::MissingParent),
        (_, Some(parent)) => {
            let found = chain.iter().any(|other| {
                other.id != commit.id
                    && other.version_root == *parent
                    && other.created_at < commit.created_at
            });
            if found {
                None
            } else {
                Some(ChainFailure::UnknownParent(*parent))
            }
        }
    }
}

/// Run all three checks on `chain[index]`.
pub fn check_commit(chain: &[VersionCommit], index: usize, entries: &[ManifestEntry]) -> CommitCheck {
    let commit = &chain[index];
    let merkle = check_merkle(commit, entries);
    let signature = check_signature(commit);
    let parent = check_parent_link(chain, index);

    let merkle_valid = merkle.is_empty();
    let signature_valid = signature.is_none();
    let parent_link_valid = parent.is_none();

    let mut failures = merkle;
    failures.extend(signature);
    failures.extend(parent);

    CommitCheck {
        commit_id: commit.id.clone(),
        version_root: commit.version_root,
        merkle_valid,
        signature_valid,
        parent_link_valid,
        failures,
    }
}

/// Verify a whole chain with entries resolved through `lookup`.
///
/// `commits` may be in any order.
pub fn verify_chain<F>(dataset_id: DatasetId, mut commits: Vec<VersionCommit>, lookup: F) -> ChainReport
where
    F: Fn(&EntryId) -> Option<ManifestEntry>,
{
    sort_chain(&mut commits);
    let checks = (0..commits.len())
        .map(|i| {
            let entries: Vec<ManifestEntry> = commits[i]
                .manifest_entry_ids
                .iter()
                .filter_map(&lookup)
                .collect();
            check_commit(&commits, i, &entries)
        })
        .collect();
    ChainReport::new(dataset_id, commits.len(), checks, true)
}
