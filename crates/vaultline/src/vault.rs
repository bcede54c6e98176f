//! The Vault: encrypted file custody on top of a version chain.
//!
//! Uploading encrypts with a fresh per-file key, stores the ciphertext as a
//! blob and seals the key under an access policy. The encryption parameters
//! live in the entry's reserved `encryption` metadata, so the Merkle root of
//! a version commits to them as well.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use vaultline_core::{
    Address, ChainReport, DatasetId, EntryId, ManifestEntry, Metadata, MetadataValue,
    VersionCommit,
};
use vaultline_seal::{
    decrypt_file, encrypt_file, generate_file_key, AuthorizationOracle, CipherSuite, PolicySeal,
    SealPolicy, SealedKey,
};
use vaultline_store::{BlobStore, Store};

use crate::chain::{Signer, VersionChain};
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// Metadata key reserved for encryption parameters.
pub const ENCRYPTION_KEY: &str = "encryption";

/// Encryption parameters recorded in an entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub cipher_suite: CipherSuite,
    pub nonce: Vec<u8>,
    pub sealed_key: SealedKey,
}

impl EncryptionInfo {
    /// The reserved metadata value.
    pub fn to_metadata(&self) -> Result<MetadataValue> {
        let mut map = BTreeMap::new();
        map.insert(
            "cipherSuite".to_string(),
            MetadataValue::from(self.cipher_suite.as_str()),
        );
        map.insert("nonce".to_string(), MetadataValue::from(hex::encode(&self.nonce)));
        map.insert(
            "sealedKey".to_string(),
            MetadataValue::from(self.sealed_key.to_hex()?),
        );
        map.insert(
            "scopeId".to_string(),
            MetadataValue::from(self.sealed_key.policy.scope_id.as_str()),
        );
        Ok(MetadataValue::Map(map))
    }

    /// Parse from an entry's metadata.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        let map = metadata
            .get(ENCRYPTION_KEY)
            .and_then(MetadataValue::as_map)
            .ok_or_else(|| VaultError::Validation("entry has no encryption metadata".into()))?;
        let field = |name: &str| {
            map.get(name)
                .and_then(MetadataValue::as_str)
                .ok_or_else(|| VaultError::Validation(format!("encryption metadata lacks {name}")))
        };

        let cipher_suite: CipherSuite = field("cipherSuite")?.parse()?;
        let nonce = hex::decode(field("nonce")?)
            .map_err(|e| VaultError::Validation(format!("encryption nonce: {e}")))?;
        let sealed_key = SealedKey::from_hex(field("sealedKey")?)?;
        if field("scopeId")? != sealed_key.policy.scope_id {
            return Err(VaultError::Validation(
                "encryption scope does not match sealed key policy".into(),
            ));
        }

        Ok(Self {
            cipher_suite,
            nonce,
            sealed_key,
        })
    }
}

/// Result of [`Vault::clone_dataset`].
#[derive(Debug, Clone)]
pub struct ClonedDataset {
    /// The verification the clone was gated on.
    pub report: ChainReport,
    /// Every committed entry the caller may read, with its plaintext.
    pub files: Vec<(ManifestEntry, Vec<u8>)>,
    /// Entries withheld because the caller is not authorized.
    pub skipped: Vec<EntryId>,
}

/// Encrypted, versioned file custody.
pub struct Vault<S: Store, B: BlobStore> {
    chain: VersionChain<S>,
    blobs: Arc<B>,
    seal: PolicySeal,
    config: VaultConfig,
}

impl<S: Store, B: BlobStore> Vault<S, B> {
    /// A vault that authorizes from embedded policy lists only.
    pub fn new(store: Arc<S>, blobs: Arc<B>, config: VaultConfig) -> Self {
        Self {
            chain: VersionChain::new(store),
            blobs,
            seal: PolicySeal::policy_only(config.seal_config()),
            config,
        }
    }

    /// Consult `oracle` on every unseal.
    pub fn with_oracle(mut self, oracle: Arc<dyn AuthorizationOracle>) -> Self {
        self.seal = PolicySeal::with_oracle(oracle, self.config.seal_config());
        self
    }

    /// Sign local commits with `signer`.
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.chain = self.chain.with_signer(signer);
        self
    }

    /// Get the version chain, e.g. for the two-phase commit.
    pub fn chain(&self) -> &VersionChain<S> {
        &self.chain
    }

    /// Get the configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn store(&self) -> &S {
        self.chain.store()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt and stage a file as a pending entry of `dataset`.
    pub async fn add_file(
        &self,
        dataset: &DatasetId,
        path: Option<&str>,
        plaintext: &[u8],
        mut metadata: Metadata,
        policy: &SealPolicy,
    ) -> Result<ManifestEntry> {
        if metadata.contains_key(ENCRYPTION_KEY) {
            return Err(VaultError::Validation(format!(
                "metadata key {ENCRYPTION_KEY:?} is reserved"
            )));
        }

        let file_key = generate_file_key();
        let encrypted = encrypt_file(plaintext, &file_key)?;
        let sealed_key = self.seal.seal_key(&file_key, policy)?;
        drop(file_key);

        let info = EncryptionInfo {
            cipher_suite: encrypted.cipher_suite,
            nonce: encrypted.nonce,
            sealed_key,
        };
        metadata.insert(ENCRYPTION_KEY.to_string(), info.to_metadata()?);

        let blob_id = self.blobs.put(Bytes::from(encrypted.ciphertext)).await?;
        let mut entry = ManifestEntry::new(dataset.clone(), blob_id);
        entry.path = path.map(str::to_string);
        entry.metadata = metadata;
        self.store().insert_entry(&entry).await?;

        debug!(%dataset, entry = %entry.id, blob = %entry.blob_id, scope = %policy.scope_id, "file staged");
        Ok(entry)
    }

    /// Decrypt a stored entry for `caller`.
    ///
    /// Authorization is decided before any key material is decrypted.
    pub async fn read_file(&self, entry_id: &EntryId, caller: &Address) -> Result<Vec<u8>> {
        let entry = self
            .store()
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("manifest entry {entry_id}")))?;

        if self.config.verify_before_read {
            self.ensure_verified(&entry).await?;
        }
        self.decrypt_entry(&entry, caller).await
    }

    async fn decrypt_entry(&self, entry: &ManifestEntry, caller: &Address) -> Result<Vec<u8>> {
        let info = EncryptionInfo::from_metadata(&entry.metadata)?;
        let file_key = self.seal.unseal(&info.sealed_key, caller).await?;

        let ciphertext = self
            .blobs
            .get(&entry.blob_id)
            .await?
            .ok_or_else(|| VaultError::Dependency(format!("blob {} is unavailable", entry.blob_id)))?;

        Ok(decrypt_file(
            &ciphertext,
            &info.nonce,
            &file_key,
            info.cipher_suite,
        )?)
    }

    /// Fail unless the commit that introduced `entry` verifies.
    async fn ensure_verified(&self, entry: &ManifestEntry) -> Result<()> {
        let commits = self.store().list_commits(&entry.dataset_id).await?;
        let committing = commits
            .iter()
            .find(|c| c.manifest_entry_ids.contains(&entry.id))
            .ok_or_else(|| {
                VaultError::Validation(format!("entry {} is not committed", entry.id))
            })?;

        let report = self.chain.verify_chain(&entry.dataset_id).await?;
        match report.check(&committing.id) {
            Some(check) if check.is_valid() => Ok(()),
            _ => {
                warn!(dataset = %entry.dataset_id, commit = %committing.id, "refusing read from unverified version");
                Err(VaultError::Authentication(format!(
                    "version {} failed verification",
                    committing.id
                )))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Versions
    // ─────────────────────────────────────────────────────────────────────────

    /// Commit every pending entry of `dataset`.
    pub async fn commit(
        &self,
        dataset: &DatasetId,
        author: Option<String>,
        note: Option<String>,
    ) -> Result<VersionCommit> {
        self.chain.commit(dataset, author, note).await
    }

    /// Audit the chain of `dataset`.
    pub async fn verify(&self, dataset: &DatasetId) -> Result<ChainReport> {
        self.chain.verify_chain(dataset).await
    }

    /// Verify `dataset`, then decrypt every committed entry `caller` may read.
    ///
    /// Entries the caller is not authorized for are skipped and listed.
    /// Any other failure, including a tampered blob, aborts the clone.
    pub async fn clone_dataset(&self, dataset: &DatasetId, caller: &Address) -> Result<ClonedDataset> {
        let report = self.chain.verify_chain(dataset).await?;
        if !report.valid {
            return Err(VaultError::Authentication(format!(
                "chain of dataset {dataset} failed verification"
            )));
        }

        let commits = self.store().list_commits(dataset).await?;
        let mut seen = HashSet::new();
        let ids: Vec<EntryId> = commits
            .iter()
            .flat_map(|c| c.manifest_entry_ids.iter())
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();
        let entries = self.store().get_entries(&ids).await?;

        let mut files = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();
        for entry in entries {
            match self.decrypt_entry(&entry, caller).await {
                Ok(plaintext) => files.push((entry, plaintext)),
                Err(VaultError::Authorization(reason)) => {
                    debug!(%dataset, entry = %entry.id, %reason, "skipping unauthorized entry");
                    skipped.push(entry.id);
                }
                Err(e) => return Err(e),
            }
        }

        info!(%dataset, files = files.len(), skipped = skipped.len(), "dataset cloned");
        Ok(ClonedDataset {
            report,
            files,
            skipped,
        })
    }
}
