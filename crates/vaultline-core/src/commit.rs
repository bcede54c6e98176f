//! Version commits: signed, chained snapshots of manifest entries.
//!
//! A commit signs the canonical JSON of
//! `{"datasetId", "parentRoot", "timestamp", "versionRoot"}` (keys sorted,
//! hashes as lowercase hex, `parentRoot` null for the first commit,
//! timestamp in Unix milliseconds).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::canonical_json;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Hash};
use crate::manifest::MetadataValue;
use crate::types::{CommitId, DatasetId, EntryId};

/// The fields a commit signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignablePayload {
    pub dataset_id: DatasetId,
    pub version_root: Sha256Hash,
    pub parent_root: Option<Sha256Hash>,
    pub timestamp: i64,
}

impl SignablePayload {
    /// Canonical JSON text of the payload.
    pub fn to_canonical_json(&self) -> String {
        let mut map = BTreeMap::new();
        map.insert(
            "datasetId".to_string(),
            MetadataValue::String(self.dataset_id.as_str().to_string()),
        );
        map.insert(
            "parentRoot".to_string(),
            match &self.parent_root {
                Some(root) => MetadataValue::String(root.to_hex()),
                None => MetadataValue::Null,
            },
        );
        map.insert("timestamp".to_string(), MetadataValue::Int(self.timestamp));
        map.insert(
            "versionRoot".to_string(),
            MetadataValue::String(self.version_root.to_hex()),
        );
        canonical_json(&MetadataValue::Map(map))
    }

    /// The exact bytes that are signed.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_canonical_json().into_bytes()
    }
}

/// A signed version of a dataset. Immutable once created; append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCommit {
    pub id: CommitId,
    pub dataset_id: DatasetId,
    pub version_root: Sha256Hash,
    pub parent_root: Option<Sha256Hash>,
    pub signature: Ed25519Signature,
    pub public_key: Ed25519PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Unix milliseconds. Strictly increasing along a chain.
    pub created_at: i64,
    pub manifest_entry_ids: Vec<EntryId>,
}

impl VersionCommit {
    /// Rebuild the payload this commit claims to have signed.
    pub fn signable_payload(&self) -> SignablePayload {
        SignablePayload {
            dataset_id: self.dataset_id.clone(),
            version_root: self.version_root,
            parent_root: self.parent_root,
            timestamp: self.created_at,
        }
    }

    /// Verify the stored signature against the stored public key.
    pub fn verify_signature(&self) -> bool {
        self.public_key
            .verify(&self.signable_payload().to_bytes(), &self.signature)
    }

    /// Whether this is the first commit of its chain.
    pub fn is_initial(&self) -> bool {
        self.parent_root.is_none()
    }
}

/// Builder for creating commits.
pub struct CommitBuilder {
    dataset_id: DatasetId,
    version_root: Sha256Hash,
    parent_root: Option<Sha256Hash>,
    timestamp: i64,
    entry_ids: Vec<EntryId>,
    author: Option<String>,
    note: Option<String>,
}

impl CommitBuilder {
    /// Start building a commit over `version_root`.
    pub fn new(dataset_id: DatasetId, version_root: Sha256Hash) -> Self {
        Self {
            dataset_id,
            version_root,
            parent_root: None,
            timestamp: 0,
            entry_ids: Vec::new(),
            author: None,
            note: None,
        }
    }

    /// Set the parent root.
    pub fn parent(mut self, parent_root: Option<Sha256Hash>) -> Self {
        self.parent_root = parent_root;
        self
    }

    /// Set the timestamp (Unix milliseconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the referenced entries.
    pub fn entries(mut self, ids: Vec<EntryId>) -> Self {
        self.entry_ids = ids;
        self
    }

    /// Set the author.
    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// Set the note.
    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// The payload that will be signed.
    pub fn payload(&self) -> SignablePayload {
        SignablePayload {
            dataset_id: self.dataset_id.clone(),
            version_root: self.version_root,
            parent_root: self.parent_root,
            timestamp: self.timestamp,
        }
    }

    /// Build and sign the commit with a local keypair.
    pub fn sign(self, keypair: &Keypair) -> VersionCommit {
        let signature = keypair.sign(&self.payload().to_bytes());
        self.with_signature(signature, keypair.public_key())
    }

    /// Build the commit around a signature produced elsewhere.
    ///
    /// The signature is not checked here.
    pub fn with_signature(
        self,
        signature: Ed25519Signature,
        public_key: Ed25519PublicKey,
    ) -> VersionCommit {
        VersionCommit {
            id: CommitId::generate(),
            dataset_id: self.dataset_id,
            version_root: self.version_root,
            parent_root: self.parent_root,
            signature,
            public_key,
            author: self.author,
            note: self.note,
            created_at: self.timestamp,
            manifest_entry_ids: self.entry_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> Sha256Hash {
        Sha256Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_payload_canonical_form() {
        let payload = SignablePayload {
            dataset_id: DatasetId::new("ds-1").unwrap(),
            version_root: root(0xaa),
            parent_root: None,
            timestamp: 1_700_000_000_000,
        };
        let expected = format!(
            r#"{{"datasetId":"ds-1","parentRoot":null,"timestamp":1700000000000,"versionRoot":"{}"}}"#,
            "aa".repeat(32)
        );
        assert_eq!(payload.to_canonical_json(), expected);

        let with_parent = SignablePayload {
            parent_root: Some(root(0x01)),
            ..payload
        };
        assert!(with_parent
            .to_canonical_json()
            .contains(&format!(r#""parentRoot":"{}""#, "01".repeat(32))));
    }

    #[test]
    fn test_signed_commit_verifies() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let commit = CommitBuilder::new(DatasetId::new("ds").unwrap(), root(1))
            .timestamp(1000)
            .entries(vec![EntryId::new("e1").unwrap()])
            .author(Some("alice".into()))
            .sign(&keypair);

        assert!(commit.is_initial());
        assert_eq!(commit.created_at, 1000);
        assert!(commit.verify_signature());
    }

    #[test]
    fn test_field_tampering_breaks_signature() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let commit = CommitBuilder::new(DatasetId::new("ds").unwrap(), root(1))
            .parent(Some(root(2)))
            .timestamp(1000)
            .sign(&keypair);

        let mut t = commit.clone();
        t.created_at += 1;
        assert!(!t.verify_signature());

        let mut t = commit.clone();
        t.version_root = root(3);
        assert!(!t.verify_signature());

        let mut t = commit.clone();
        t.parent_root = None;
        assert!(!t.verify_signature());

        let mut t = commit.clone();
        t.dataset_id = DatasetId::new("other").unwrap();
        assert!(!t.verify_signature());

        // Author and note are not covered by the signature.
        let mut t = commit;
        t.note = Some("edited".into());
        assert!(t.verify_signature());
    }

    #[test]
    fn test_external_signature() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let builder = CommitBuilder::new(DatasetId::new("ds").unwrap(), root(9)).timestamp(5);
        let signature = keypair.sign(&builder.payload().to_bytes());
        let commit = builder.with_signature(signature, keypair.public_key());
        assert!(commit.verify_signature());
    }

    #[test]
    fn test_commit_json_wire_form() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let commit = CommitBuilder::new(DatasetId::new("ds").unwrap(), root(1))
            .timestamp(10)
            .sign(&keypair);
        let json = serde_json::to_value(&commit).unwrap();

        assert_eq!(json["versionRoot"], "01".repeat(32));
        assert!(json["parentRoot"].is_null());
        assert_eq!(json["createdAt"], 10);
        assert_eq!(json["publicKey"], keypair.public_key().to_hex());

        let back: VersionCommit = serde_json::from_value(json).unwrap();
        assert_eq!(back, commit);
    }
}
