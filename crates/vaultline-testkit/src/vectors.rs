//! Golden test vectors for deterministic verification.
//!
//! Expected values were computed independently of this codebase from the
//! documented leaf encoding and payload format. Any implementation that
//! reproduces them stores and signs byte-identical data.

use vaultline_core::{
    compute_manifest_root, leaf_hash, BlobId, CommitBuilder, DatasetId, EntryId, Keypair,
    ManifestEntry, Metadata, SignablePayload, VersionCommit,
};

/// Dataset of every golden entry.
pub const DATASET: &str = "ds-golden";

/// Seed of the golden signing key.
pub const SIGNING_SEED: [u8; 32] = [0x42; 32];

/// Timestamp of the golden genesis commit.
pub const GENESIS_MILLIS: i64 = 1_736_870_400_000;

/// Inputs of one golden entry.
#[derive(Debug, Clone, Copy)]
pub struct GoldenEntry {
    pub id: &'static str,
    pub blob: &'static str,
    pub path: Option<&'static str>,
    pub metadata_json: &'static str,
    /// Expected leaf hash (hex).
    pub expected_leaf: &'static str,
}

/// The three golden entries, in id order.
pub const ENTRIES: [GoldenEntry; 3] = [
    GoldenEntry {
        id: "entry-1",
        blob: "blob-a",
        path: Some("a.txt"),
        metadata_json: r#"{"size": 42, "kind": "csv"}"#,
        expected_leaf: "a2087a06b06375b3e8d147888f68d9b5870453d751dd60711bb8d16fdcdec1f0",
    },
    GoldenEntry {
        id: "entry-2",
        blob: "blob-b",
        path: None,
        metadata_json: "{}",
        expected_leaf: "29beea5bcb725d8bc803dbfdc73675bb3fe5f785aa749207751e7dd815ae30e8",
    },
    GoldenEntry {
        id: "entry-3",
        blob: "blob-c",
        path: Some("dir/c.bin"),
        metadata_json: r#"{"tags": ["x", "y"], "nested": {"z": null, "a": true}}"#,
        expected_leaf: "17d32bd8aead7a4830055ca2de4ddfef0af4a498884266f508222058d4fa8ca3",
    },
];

pub const EMPTY_ROOT_HEX: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
/// Root of entries 1 and 2.
pub const TWO_LEAF_ROOT_HEX: &str =
    "6f1d68bdfd8096408e1fb381d0b739fe81694e7d972f0f59b819e8e6cb39e5bc";
/// Root of all three entries. The third leaf is promoted at level one.
pub const THREE_LEAF_ROOT_HEX: &str =
    "826bf6bcc9c0ad330a87ed6b0c985fb328c3c9fc362a17ead92829f22be48098";
pub const PUBLIC_KEY_HEX: &str =
    "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12";
/// Signed payload of the genesis commit over entries 1 and 2.
pub const GENESIS_PAYLOAD: &str = r#"{"datasetId":"ds-golden","parentRoot":null,"timestamp":1736870400000,"versionRoot":"6f1d68bdfd8096408e1fb381d0b739fe81694e7d972f0f59b819e8e6cb39e5bc"}"#;
pub const GENESIS_SIGNATURE_HEX: &str = "eeac7f9dd8f483545d3cc24255313810acc9e496850444e2c696ed90cd3a6865c2dbd2db3e24b868c0d8a7ab73d57a9b2e690eb6eb356eaff968a09ff1769503";
/// Signature of the second commit over all three entries.
pub const SECOND_SIGNATURE_HEX: &str = "eb1df0d338c5a5113c4e0dfdd3c5d2fb8e357226a93d62125f89a0a3e0d6fff38df076468c30495dc692c407ef70a6065c543ae39bd6b655079001cdb5ffcc00";

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Expected output (hex or canonical text).
    pub expected: &'static str,
    /// Recomputes the output from the golden inputs.
    pub compute: fn() -> String,
}

/// The golden dataset id.
pub fn dataset() -> DatasetId {
    DatasetId::new(DATASET).expect("golden dataset id is non-empty")
}

/// The golden signing keypair.
pub fn keypair() -> Keypair {
    Keypair::from_seed(&SIGNING_SEED)
}

/// Build the manifest entry of a golden input.
pub fn golden_entry(golden: &GoldenEntry) -> ManifestEntry {
    let metadata: Metadata =
        serde_json::from_str(golden.metadata_json).expect("golden metadata is valid JSON");
    ManifestEntry {
        id: EntryId::new(golden.id).expect("golden entry id is non-empty"),
        dataset_id: dataset(),
        blob_id: BlobId::new(golden.blob).expect("golden blob id is non-empty"),
        path: golden.path.map(str::to_string),
        metadata,
    }
}

/// All golden entries, in id order.
pub fn golden_entries() -> Vec<ManifestEntry> {
    ENTRIES.iter().map(golden_entry).collect()
}

/// The two golden commits: genesis over entries 1..=2, then a child over
/// entries 1..=3.
pub fn golden_commits() -> (VersionCommit, VersionCommit) {
    let entries = golden_entries();
    let keypair = keypair();
    let genesis = CommitBuilder::new(dataset(), compute_manifest_root(&entries[..2]))
        .timestamp(GENESIS_MILLIS)
        .entries(entries[..2].iter().map(|e| e.id.clone()).collect())
        .sign(&keypair);
    let second = CommitBuilder::new(dataset(), compute_manifest_root(&entries))
        .parent(Some(genesis.version_root))
        .timestamp(GENESIS_MILLIS + 1)
        .entries(entries.iter().map(|e| e.id.clone()).collect())
        .sign(&keypair);
    (genesis, second)
}

fn genesis_payload() -> SignablePayload {
    golden_commits().0.signable_payload()
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty manifest root",
            expected: EMPTY_ROOT_HEX,
            compute: || compute_manifest_root(&[]).to_hex(),
        },
        GoldenVector {
            name: "leaf with path and scalar metadata",
            expected: ENTRIES[0].expected_leaf,
            compute: || leaf_hash(&golden_entry(&ENTRIES[0])).to_hex(),
        },
        GoldenVector {
            name: "leaf without path or metadata",
            expected: ENTRIES[1].expected_leaf,
            compute: || leaf_hash(&golden_entry(&ENTRIES[1])).to_hex(),
        },
        GoldenVector {
            name: "leaf with nested metadata",
            expected: ENTRIES[2].expected_leaf,
            compute: || leaf_hash(&golden_entry(&ENTRIES[2])).to_hex(),
        },
        GoldenVector {
            name: "two-leaf root",
            expected: TWO_LEAF_ROOT_HEX,
            compute: || compute_manifest_root(&golden_entries()[..2]).to_hex(),
        },
        GoldenVector {
            name: "three-leaf root with promoted node",
            expected: THREE_LEAF_ROOT_HEX,
            compute: || compute_manifest_root(&golden_entries()).to_hex(),
        },
        GoldenVector {
            name: "signing public key",
            expected: PUBLIC_KEY_HEX,
            compute: || keypair().public_key().to_hex(),
        },
        GoldenVector {
            name: "genesis signable payload",
            expected: GENESIS_PAYLOAD,
            compute: || genesis_payload().to_canonical_json(),
        },
        GoldenVector {
            name: "genesis signature",
            expected: GENESIS_SIGNATURE_HEX,
            compute: || golden_commits().0.signature.to_hex(),
        },
        GoldenVector {
            name: "second commit signature",
            expected: SECOND_SIGNATURE_HEX,
            compute: || golden_commits().1.signature.to_hex(),
        },
    ]
}

/// Recompute every vector: `(name, matches, actual)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = (v.compute)();
            (v.name.to_string(), actual == v.expected, actual)
        })
        .collect()
}
