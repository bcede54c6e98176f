//! Golden vectors for cross-implementation verification.
//!
//! Every implementation must produce identical leaf hashes, roots, signed
//! payloads and signatures for the fixed inputs in `vaultline_testkit`.

use std::sync::Arc;

use vaultline::core::{verify, Ed25519PublicKey, Sha256Hash};
use vaultline::store::{SqliteStore, Store};
use vaultline::VersionChain;
use vaultline_testkit::vectors::{
    self, golden_commits, golden_entries, GENESIS_PAYLOAD, GENESIS_SIGNATURE_HEX,
    PUBLIC_KEY_HEX, THREE_LEAF_ROOT_HEX, TWO_LEAF_ROOT_HEX,
};

#[test]
fn test_all_golden_vectors() {
    let mismatches: Vec<_> = vectors::verify_all_vectors()
        .into_iter()
        .filter(|(_, ok, _)| !ok)
        .collect();
    assert!(mismatches.is_empty(), "mismatched vectors: {mismatches:?}");
}

#[test]
fn test_golden_signature_verifies_over_raw_bytes() {
    let signature = hex::decode(GENESIS_SIGNATURE_HEX).unwrap();
    let public_key = hex::decode(PUBLIC_KEY_HEX).unwrap();
    assert!(verify(GENESIS_PAYLOAD.as_bytes(), &signature, &public_key));

    let mut tampered = GENESIS_PAYLOAD.to_string();
    tampered = tampered.replace("1736870400000", "1736870400001");
    assert!(!verify(tampered.as_bytes(), &signature, &public_key));
}

#[test]
fn test_golden_commit_fields() {
    let (genesis, second) = golden_commits();
    assert_eq!(genesis.version_root, Sha256Hash::from_hex(TWO_LEAF_ROOT_HEX).unwrap());
    assert_eq!(second.version_root, Sha256Hash::from_hex(THREE_LEAF_ROOT_HEX).unwrap());
    assert_eq!(second.parent_root, Some(genesis.version_root));
    assert_eq!(genesis.public_key, Ed25519PublicKey::from_hex(PUBLIC_KEY_HEX).unwrap());
}

#[tokio::test]
async fn test_golden_chain_survives_sqlite() {
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    for entry in golden_entries() {
        store.insert_entry(&entry).await.unwrap();
    }
    let (genesis, second) = golden_commits();
    store.append_commit(&genesis, None).await.unwrap();
    store
        .append_commit(&second, Some(&genesis.version_root))
        .await
        .unwrap();

    let report = VersionChain::new(store.clone())
        .verify_chain(&vectors::dataset())
        .await
        .unwrap();
    assert!(report.valid);
    assert_eq!(report.version_count, 2);

    // Stored metadata round-trips to the same canonical form.
    let stored = store.get_commit(&second.id).await.unwrap().unwrap();
    assert_eq!(stored, second);
}
