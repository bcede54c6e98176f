//! The version chain: commit creation and chain audit for each dataset.
//!
//! Appends are serialized per dataset twice over: a process-local mutex keeps
//! callers sharing one [`VersionChain`] from racing, and the store's atomic
//! compare-and-append rejects the loser of any race the mutex cannot see
//! (another process, another chain instance on the same store).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use vaultline_core::validation::{check_commit, sort_chain};
use vaultline_core::{
    compute_manifest_root, now_millis, ChainReport, CommitBuilder, DatasetId, Ed25519PublicKey,
    Ed25519Signature, EntryId, Keypair, ManifestEntry, Sha256Hash, SignablePayload, VersionCommit,
};
use vaultline_store::{AppendResult, KeyCustody, Store};

use crate::error::{Result, VaultError};

/// Where commit signatures come from.
#[derive(Clone)]
pub enum Signer {
    /// A keypair held in memory.
    Local(Keypair),
    /// A keystore loaded from custody on every commit.
    Custody(Arc<dyn KeyCustody>),
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signer::Local(keypair) => f.debug_tuple("Local").field(keypair).finish(),
            Signer::Custody(_) => f.write_str("Custody(..)"),
        }
    }
}

/// Cooperative cancellation for long chain audits.
///
/// Checked between commits, never inside one.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// First phase of an externally signed commit. Nothing has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommit {
    /// What the external signer must sign, via [`PreparedCommit::signable_bytes`].
    pub payload: SignablePayload,
    pub version_root: Sha256Hash,
    pub parent_root: Option<Sha256Hash>,
    pub entry_ids: Vec<EntryId>,
    pub entry_count: usize,
}

impl PreparedCommit {
    pub fn dataset_id(&self) -> &DatasetId {
        &self.payload.dataset_id
    }

    /// The exact bytes to sign.
    pub fn signable_bytes(&self) -> Vec<u8> {
        self.payload.to_bytes()
    }
}

/// Second phase of an externally signed commit.
#[derive(Debug, Clone)]
pub struct CommitSubmission {
    pub prepared: PreparedCommit,
    pub signature: Ed25519Signature,
    pub public_key: Ed25519PublicKey,
    pub author: Option<String>,
    pub note: Option<String>,
}

impl CommitSubmission {
    pub fn new(
        prepared: PreparedCommit,
        signature: Ed25519Signature,
        public_key: Ed25519PublicKey,
    ) -> Self {
        Self {
            prepared,
            signature,
            public_key,
            author: None,
            note: None,
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Commit creation and verification over a [`Store`].
pub struct VersionChain<S: Store> {
    store: Arc<S>,
    signer: Option<Signer>,
    locks: Mutex<HashMap<DatasetId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: Store> VersionChain<S> {
    /// A chain with no local signer. Only the two-phase commit works.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            signer: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sign local commits with `signer`.
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Commit every pending entry of `dataset` as a new signed version.
    ///
    /// Fails with `NothingToCommit` when no entries are pending,
    /// `NoSigningKey` without a signer, and `ConcurrentModification` if the
    /// head moved between reading it and appending.
    pub async fn commit(
        &self,
        dataset: &DatasetId,
        author: Option<String>,
        note: Option<String>,
    ) -> Result<VersionCommit> {
        let lock = self.dataset_lock(dataset)?;
        let result = {
            let _guard = lock.lock().await;
            self.commit_locked(dataset, author, note).await
        };
        self.release_lock(dataset, lock);
        result
    }

    async fn commit_locked(
        &self,
        dataset: &DatasetId,
        author: Option<String>,
        note: Option<String>,
    ) -> Result<VersionCommit> {
        // Head before pending: an entry committed in between then shows up
        // as a moved head, never as a second commit of the same entry.
        let parent = self.store.latest_commit(dataset).await?;
        let pending = self.store.pending_entries(dataset).await?;
        if pending.is_empty() {
            return Err(VaultError::NothingToCommit(dataset.clone()));
        }
        let keypair = self.signing_keypair().await?;

        let builder = Self::build(dataset, &pending, parent.as_ref())
            .author(author)
            .note(note);
        let commit = builder.sign(&keypair);

        self.append(commit, parent.map(|p| p.version_root)).await
    }

    /// Compute everything an external signer needs. Mutates nothing.
    pub async fn prepare_commit(&self, dataset: &DatasetId) -> Result<PreparedCommit> {
        let parent = self.store.latest_commit(dataset).await?;
        let pending = self.store.pending_entries(dataset).await?;
        if pending.is_empty() {
            return Err(VaultError::NothingToCommit(dataset.clone()));
        }
        let payload = Self::build(dataset, &pending, parent.as_ref()).payload();

        debug!(%dataset, version_root = %payload.version_root, entries = pending.len(), "commit prepared");
        Ok(PreparedCommit {
            version_root: payload.version_root,
            parent_root: payload.parent_root,
            entry_count: pending.len(),
            entry_ids: pending.into_iter().map(|e| e.id).collect(),
            payload,
        })
    }

    /// Persist an externally signed commit.
    ///
    /// The signed payload is authoritative: its root and parent are
    /// re-derived from the store and the signature is verified before
    /// anything is written.
    pub async fn submit_commit(&self, submission: CommitSubmission) -> Result<VersionCommit> {
        let CommitSubmission {
            prepared,
            signature,
            public_key,
            author,
            note,
        } = submission;
        let PreparedCommit {
            payload, entry_ids, ..
        } = prepared;
        let dataset = payload.dataset_id.clone();
        if entry_ids.is_empty() {
            return Err(VaultError::NothingToCommit(dataset));
        }
        let distinct: HashSet<&EntryId> = entry_ids.iter().collect();
        if distinct.len() != entry_ids.len() {
            return Err(VaultError::Validation(
                "prepared commit lists an entry more than once".into(),
            ));
        }

        let lock = self.dataset_lock(&dataset)?;
        let result = {
            let _guard = lock.lock().await;
            self.submit_locked(payload, entry_ids, signature, public_key, author, note)
                .await
        };
        self.release_lock(&dataset, lock);
        result
    }

    async fn submit_locked(
        &self,
        payload: SignablePayload,
        entry_ids: Vec<EntryId>,
        signature: Ed25519Signature,
        public_key: Ed25519PublicKey,
        author: Option<String>,
        note: Option<String>,
    ) -> Result<VersionCommit> {
        let SignablePayload {
            dataset_id: dataset,
            version_root,
            parent_root,
            timestamp,
        } = payload.clone();

        let head = self.store.latest_commit(&dataset).await?;
        let current = head.as_ref().map(|c| c.version_root);
        if current != parent_root {
            return Err(VaultError::ConcurrentModification {
                dataset_id: dataset,
                expected: parent_root,
                current,
            });
        }
        if head.is_some_and(|h| timestamp <= h.created_at) {
            return Err(VaultError::Validation(
                "prepared timestamp is not after the parent commit".into(),
            ));
        }

        let pending: HashSet<EntryId> = self
            .store
            .pending_entries(&dataset)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        if let Some(stale) = entry_ids.iter().find(|id| !pending.contains(*id)) {
            return Err(VaultError::Validation(format!(
                "entry {stale} is not pending"
            )));
        }
        let entries = self.store.get_entries(&entry_ids).await?;
        if compute_manifest_root(&entries) != version_root {
            return Err(VaultError::Validation(
                "prepared version root does not match stored entries".into(),
            ));
        }

        if !public_key.verify(&payload.to_bytes(), &signature) {
            warn!(%dataset, public_key = %public_key.to_hex(), "rejected externally signed commit");
            return Err(VaultError::Authentication(
                "commit signature does not verify".into(),
            ));
        }

        let commit = CommitBuilder::new(dataset, version_root)
            .parent(parent_root)
            .timestamp(timestamp)
            .entries(entry_ids)
            .author(author)
            .note(note)
            .with_signature(signature, public_key);

        self.append(commit, parent_root).await
    }

    fn build(
        dataset: &DatasetId,
        pending: &[ManifestEntry],
        parent: Option<&VersionCommit>,
    ) -> CommitBuilder {
        let timestamp = match parent {
            Some(p) => now_millis().max(p.created_at + 1),
            None => now_millis(),
        };
        CommitBuilder::new(dataset.clone(), compute_manifest_root(pending))
            .parent(parent.map(|p| p.version_root))
            .timestamp(timestamp)
            .entries(pending.iter().map(|e| e.id.clone()).collect())
    }

    async fn append(
        &self,
        commit: VersionCommit,
        expected_parent: Option<Sha256Hash>,
    ) -> Result<VersionCommit> {
        match self
            .store
            .append_commit(&commit, expected_parent.as_ref())
            .await?
        {
            AppendResult::Appended => {
                info!(
                    dataset = %commit.dataset_id,
                    version_root = %commit.version_root,
                    entries = commit.manifest_entry_ids.len(),
                    "commit appended"
                );
                Ok(commit)
            }
            AppendResult::ParentMismatch { current } => {
                warn!(dataset = %commit.dataset_id, "lost commit race");
                Err(VaultError::ConcurrentModification {
                    dataset_id: commit.dataset_id,
                    expected: expected_parent,
                    current,
                })
            }
        }
    }

    async fn signing_keypair(&self) -> Result<Keypair> {
        match &self.signer {
            None => Err(VaultError::NoSigningKey),
            Some(Signer::Local(keypair)) => Ok(keypair.clone()),
            Some(Signer::Custody(custody)) => match custody.load().await? {
                Some(keystore) => Ok(keystore.keypair()?),
                None => Err(VaultError::NoSigningKey),
            },
        }
    }

    fn dataset_lock(&self, dataset: &DatasetId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| VaultError::Dependency(format!("lock poisoned: {e}")))?;
        Ok(locks.entry(dataset.clone()).or_default().clone())
    }

    /// Drop `dataset`'s lock from the map once no other caller holds it.
    fn release_lock(&self, dataset: &DatasetId, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        // A poisoned map only costs us the pruning.
        if let Ok(mut locks) = self.locks.lock() {
            if locks.get(dataset).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(dataset);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Audit every commit of `dataset`.
    ///
    /// Inconsistencies are reported in the returned [`ChainReport`]; only
    /// storage failures are errors.
    pub async fn verify_chain(&self, dataset: &DatasetId) -> Result<ChainReport> {
        self.verify_chain_cancellable(dataset, &CancelFlag::new())
            .await
    }

    /// [`VersionChain::verify_chain`], stopping between commits once `cancel`
    /// is set. A cancelled report has `complete == false` and is never valid.
    pub async fn verify_chain_cancellable(
        &self,
        dataset: &DatasetId,
        cancel: &CancelFlag,
    ) -> Result<ChainReport> {
        let mut commits = self.store.list_commits(dataset).await?;
        sort_chain(&mut commits);

        let mut checks = Vec::with_capacity(commits.len());
        let mut complete = true;
        for (index, commit) in commits.iter().enumerate() {
            if cancel.is_cancelled() {
                complete = false;
                break;
            }
            let entries = self.store.get_entries(&commit.manifest_entry_ids).await?;
            let check = check_commit(&commits, index, &entries);
            for failure in &check.failures {
                warn!(%dataset, commit = %commit.id, %failure, "commit failed verification");
            }
            checks.push(check);
        }

        let report = ChainReport::new(dataset.clone(), commits.len(), checks, complete);
        info!(
            %dataset,
            valid = report.valid,
            versions = report.version_count,
            checked = report.commits.len(),
            complete = report.complete,
            "chain verified"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vaultline_core::{BlobId, ChainFailure, CommitId};
    use vaultline_store::{Keystore, MemoryKeyCustody, MemoryStore};

    fn dataset() -> DatasetId {
        DatasetId::new("ds").unwrap()
    }

    fn chain(store: Arc<MemoryStore>) -> VersionChain<MemoryStore> {
        VersionChain::new(store).with_signer(Signer::Local(Keypair::from_seed(&[9; 32])))
    }

    async fn stage(store: &MemoryStore, blob: &str) -> ManifestEntry {
        let entry = ManifestEntry::new(dataset(), BlobId::new(blob).unwrap()).with_path(blob);
        store.insert_entry(&entry).await.unwrap();
        entry
    }

    #[tokio::test]
    async fn test_commit_and_verify() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain(store.clone());

        let e1 = stage(&store, "b1").await;
        let c1 = chain.commit(&dataset(), Some("ana".into()), None).await.unwrap();
        assert_eq!(c1.parent_root, None);
        assert_eq!(c1.version_root, compute_manifest_root(&[e1]));
        assert_eq!(c1.author.as_deref(), Some("ana"));

        stage(&store, "b2").await;
        let c2 = chain.commit(&dataset(), None, Some("second".into())).await.unwrap();
        assert_eq!(c2.parent_root, Some(c1.version_root));
        assert!(c2.created_at > c1.created_at);

        let report = chain.verify_chain(&dataset()).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.version_count, 2);
        assert!(report.commits.iter().all(|c| c.failures.is_empty()));
    }

    #[tokio::test]
    async fn test_nothing_to_commit() {
        let store = Arc::new(MemoryStore::new());
        let err = chain(store).commit(&dataset(), None, None).await.unwrap_err();
        assert!(matches!(err, VaultError::NothingToCommit(_)));
    }

    #[tokio::test]
    async fn test_no_signing_key() {
        let store = Arc::new(MemoryStore::new());
        stage(&store, "b1").await;

        let bare = VersionChain::new(store.clone());
        assert!(matches!(
            bare.commit(&dataset(), None, None).await.unwrap_err(),
            VaultError::NoSigningKey
        ));

        let empty_custody = VersionChain::new(store.clone())
            .with_signer(Signer::Custody(Arc::new(MemoryKeyCustody::new())));
        assert!(matches!(
            empty_custody.commit(&dataset(), None, None).await.unwrap_err(),
            VaultError::NoSigningKey
        ));
        // Nothing was written.
        assert!(store.latest_commit(&dataset()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custody_signer() {
        let store = Arc::new(MemoryStore::new());
        let keystore = Keystore::generate();
        let public_key = keystore.public_key();
        let chain = VersionChain::new(store.clone())
            .with_signer(Signer::Custody(Arc::new(MemoryKeyCustody::with_keystore(keystore))));

        stage(&store, "b1").await;
        let commit = chain.commit(&dataset(), None, None).await.unwrap();
        assert_eq!(commit.public_key, public_key);
        assert!(commit.verify_signature());
    }

    #[tokio::test]
    async fn test_forged_root_fails_merkle_and_signature() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain(store.clone());
        stage(&store, "b1").await;
        let commit = chain.commit(&dataset(), None, None).await.unwrap();

        let mut forged = commit.clone();
        forged.version_root = Sha256Hash::hash(b"forged");
        store.replace_commit(&forged).await.unwrap();

        let report = chain.verify_chain(&dataset()).await.unwrap();
        let check = report.check(&commit.id).unwrap();
        assert!(!report.valid);
        assert!(!check.merkle_valid);
        // The signature covers the root, so it breaks too.
        assert!(!check.signature_valid);
        assert!(check.parent_link_valid);
        assert!(check
            .failures
            .iter()
            .any(|f| matches!(f, ChainFailure::RootMismatch { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_verification_is_incomplete() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain(store.clone());
        for blob in ["b1", "b2", "b3"] {
            stage(&store, blob).await;
            chain.commit(&dataset(), None, None).await.unwrap();
        }

        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = chain
            .verify_chain_cancellable(&dataset(), &cancel)
            .await
            .unwrap();
        assert!(!report.complete);
        assert!(!report.valid);
        assert_eq!(report.version_count, 3);
        assert!(report.commits.is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_is_valid() {
        let store = Arc::new(MemoryStore::new());
        let report = chain(store).verify_chain(&dataset()).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.version_count, 0);
    }

    #[tokio::test]
    async fn test_two_phase_commit() {
        let store = Arc::new(MemoryStore::new());
        let chain = VersionChain::new(store.clone());
        let wallet = Keypair::from_seed(&[5; 32]);

        stage(&store, "b1").await;
        let prepared = chain.prepare_commit(&dataset()).await.unwrap();
        assert_eq!(prepared.entry_count, 1);
        assert_eq!(prepared.parent_root, None);
        assert!(store.latest_commit(&dataset()).await.unwrap().is_none());

        let signature = wallet.sign(&prepared.signable_bytes());
        let commit = chain
            .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()).author("wallet"))
            .await
            .unwrap();
        assert_eq!(commit.public_key, wallet.public_key());
        assert!(chain.verify_chain(&dataset()).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_two_phase_rejects_bad_signature() {
        let store = Arc::new(MemoryStore::new());
        let chain = VersionChain::new(store.clone());
        let wallet = Keypair::from_seed(&[5; 32]);

        stage(&store, "b1").await;
        let prepared = chain.prepare_commit(&dataset()).await.unwrap();
        let signature = wallet.sign(b"something else");
        let err = chain
            .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Authentication(_)));
        assert!(store.latest_commit(&dataset()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_two_phase_detects_moved_head() {
        let store = Arc::new(MemoryStore::new());
        let local = chain(store.clone());
        let external = VersionChain::new(store.clone());
        let wallet = Keypair::from_seed(&[5; 32]);

        stage(&store, "b1").await;
        local.commit(&dataset(), None, None).await.unwrap();
        stage(&store, "b2").await;
        let prepared = external.prepare_commit(&dataset()).await.unwrap();

        // Someone else commits a newer staged entry while the wallet signs,
        // leaving b2 pending but moving the head.
        let sneaky = ManifestEntry::new(dataset(), BlobId::new("b3").unwrap());
        store.insert_entry(&sneaky).await.unwrap();
        let head = store.latest_commit(&dataset()).await.unwrap().unwrap();
        let interloper = CommitBuilder::new(dataset(), compute_manifest_root(&[sneaky.clone()]))
            .parent(Some(head.version_root))
            .timestamp(head.created_at + 1)
            .entries(vec![sneaky.id])
            .sign(&wallet);
        store
            .append_commit(&interloper, Some(&head.version_root))
            .await
            .unwrap();

        let signature = wallet.sign(&prepared.signable_bytes());
        let err = external
            .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ConcurrentModification { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_two_phase_rejects_repeated_entry() {
        let store = Arc::new(MemoryStore::new());
        let chain = VersionChain::new(store.clone());
        let wallet = Keypair::from_seed(&[5; 32]);

        let entry = stage(&store, "b1").await;
        let mut prepared = chain.prepare_commit(&dataset()).await.unwrap();
        // A root over the repeated leaf, signed in good faith.
        let root = compute_manifest_root(&[entry.clone(), entry.clone()]);
        prepared.entry_ids = vec![entry.id.clone(), entry.id.clone()];
        prepared.version_root = root;
        prepared.payload.version_root = root;
        let signature = wallet.sign(&prepared.signable_bytes());

        let err = chain
            .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
        assert!(!err.is_retryable());
        assert!(store.latest_commit(&dataset()).await.unwrap().is_none());
        assert_eq!(store.pending_entries(&dataset()).await.unwrap(), vec![entry]);
    }

    /// Sets the cancel flag the first time entries are fetched.
    struct CancelOnFetch {
        inner: MemoryStore,
        cancel: CancelFlag,
    }

    #[async_trait]
    impl Store for CancelOnFetch {
        async fn insert_entry(&self, entry: &ManifestEntry) -> vaultline_store::Result<()> {
            self.inner.insert_entry(entry).await
        }

        async fn get_entry(&self, id: &EntryId) -> vaultline_store::Result<Option<ManifestEntry>> {
            self.inner.get_entry(id).await
        }

        async fn get_entries(&self, ids: &[EntryId]) -> vaultline_store::Result<Vec<ManifestEntry>> {
            self.cancel.cancel();
            self.inner.get_entries(ids).await
        }

        async fn pending_entries(
            &self,
            dataset: &DatasetId,
        ) -> vaultline_store::Result<Vec<ManifestEntry>> {
            self.inner.pending_entries(dataset).await
        }

        async fn latest_commit(
            &self,
            dataset: &DatasetId,
        ) -> vaultline_store::Result<Option<VersionCommit>> {
            self.inner.latest_commit(dataset).await
        }

        async fn list_commits(&self, dataset: &DatasetId) -> vaultline_store::Result<Vec<VersionCommit>> {
            self.inner.list_commits(dataset).await
        }

        async fn get_commit(&self, id: &CommitId) -> vaultline_store::Result<Option<VersionCommit>> {
            self.inner.get_commit(id).await
        }

        async fn append_commit(
            &self,
            commit: &VersionCommit,
            expected_parent: Option<&Sha256Hash>,
        ) -> vaultline_store::Result<AppendResult> {
            self.inner.append_commit(commit, expected_parent).await
        }

        async fn replace_commit(&self, commit: &VersionCommit) -> vaultline_store::Result<()> {
            self.inner.replace_commit(commit).await
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_audit_keeps_finished_checks() {
        let seeded = Arc::new(MemoryStore::new());
        let local = chain(seeded.clone());
        let mut commits = Vec::new();
        for blob in ["b1", "b2", "b3"] {
            stage(&seeded, blob).await;
            commits.push(local.commit(&dataset(), None, None).await.unwrap());
        }

        let inner = MemoryStore::new();
        let ids: Vec<EntryId> = commits
            .iter()
            .flat_map(|c| c.manifest_entry_ids.clone())
            .collect();
        for entry in seeded.get_entries(&ids).await.unwrap() {
            inner.insert_entry(&entry).await.unwrap();
        }
        let mut parent = None;
        for commit in &commits {
            inner.append_commit(commit, parent.as_ref()).await.unwrap();
            parent = Some(commit.version_root);
        }

        let cancel = CancelFlag::new();
        let store = Arc::new(CancelOnFetch {
            inner,
            cancel: cancel.clone(),
        });
        let report = VersionChain::new(store)
            .verify_chain_cancellable(&dataset(), &cancel)
            .await
            .unwrap();

        assert!(!report.complete);
        assert!(!report.valid);
        assert_eq!(report.version_count, 3);
        assert_eq!(report.commits.len(), 1);
        let first = &report.commits[0];
        assert_eq!(first.commit_id, commits[0].id);
        assert!(first.is_valid());
    }

    #[tokio::test]
    async fn test_dataset_locks_released_after_use() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain(store.clone());
        let wallet = Keypair::from_seed(&[5; 32]);

        stage(&store, "b1").await;
        chain.commit(&dataset(), None, None).await.unwrap();
        assert!(chain.locks.lock().unwrap().is_empty());

        // Failed commits release too.
        chain.commit(&dataset(), None, None).await.unwrap_err();
        assert!(chain.locks.lock().unwrap().is_empty());

        stage(&store, "b2").await;
        let prepared = chain.prepare_commit(&dataset()).await.unwrap();
        let signature = wallet.sign(&prepared.signable_bytes());
        chain
            .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()))
            .await
            .unwrap();
        assert!(chain.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_held_lock_survives_release() {
        let store = Arc::new(MemoryStore::new());
        let chain = chain(store);

        let held = chain.dataset_lock(&dataset()).unwrap();
        let other = chain.dataset_lock(&dataset()).unwrap();
        chain.release_lock(&dataset(), other);
        // Still referenced by `held`, so the same mutex is handed out again.
        let again = chain.dataset_lock(&dataset()).unwrap();
        assert!(Arc::ptr_eq(&held, &again));
    }
}
