//! Version chain behavior across stores: the audit scenario, tampering,
//! parent-link swaps, commit races and the externally signed flow.

use std::sync::Arc;

use vaultline::core::{compute_manifest_root, Ed25519Signature, Keypair};
use vaultline::store::{FileKeyCustody, KeyCustody, Keystore, SqliteStore, Store};
use vaultline::{
    ChainFailure, CommitSubmission, ErrorKind, Signer, VaultError, VersionChain,
};
use vaultline_testkit::TestFixture;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn audit_scenario<S: Store>(store: Arc<S>, fixture: &TestFixture) {
    let chain = VersionChain::new(store.clone()).with_signer(Signer::Local(fixture.keypair.clone()));
    let dataset = &fixture.dataset;

    store.insert_entry(&fixture.make_entry("blob-1", Some("one.txt"))).await.unwrap();
    let r1 = chain.commit(dataset, Some("alice".into()), None).await.unwrap();
    assert_eq!(r1.parent_root, None);

    store.insert_entry(&fixture.make_entry("blob-2", Some("two.txt"))).await.unwrap();
    let r2 = chain.commit(dataset, None, Some("second".into())).await.unwrap();
    assert_eq!(r2.parent_root, Some(r1.version_root));

    let report = chain.verify_chain(dataset).await.unwrap();
    assert!(report.valid);
    assert!(report.complete);
    assert_eq!(report.version_count, 2);

    let mut corrupted = r1.clone();
    corrupted.signature = Ed25519Signature::ZERO;
    store.replace_commit(&corrupted).await.unwrap();

    let report = chain.verify_chain(dataset).await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.version_count, 2);

    let first = report.check(&r1.id).unwrap();
    assert!(!first.signature_valid);
    assert!(first.merkle_valid);
    assert!(first.parent_link_valid);
    assert_eq!(first.failures, vec![ChainFailure::SignatureFailed]);

    let second = report.check(&r2.id).unwrap();
    assert!(second.is_valid());
    assert!(second.failures.is_empty());
}

#[tokio::test]
async fn test_audit_scenario_memory() {
    init_tracing();
    let fixture = TestFixture::new();
    audit_scenario(fixture.store.clone(), &fixture).await;
}

#[tokio::test]
async fn test_audit_scenario_sqlite() {
    init_tracing();
    let fixture = TestFixture::new();
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    audit_scenario(store, &fixture).await;
}

#[tokio::test]
async fn test_swapped_parent_roots_fail_parent_link() {
    let fixture = TestFixture::with_seed([7; 32]);
    let e1 = fixture.make_entry("b1", None);
    let e2 = fixture.make_entry("b2", None);
    let e3 = fixture.make_entry("b3", None);

    let c1 = fixture.make_commit(&[e1.clone()], None);
    let c2 = fixture.make_commit(&[e2.clone()], Some(&c1));
    let c3 = fixture.make_commit(&[e3.clone()], Some(&c2));

    // Two independently valid commits whose parent roots are swapped and
    // re-signed: each signature verifies, yet c2 now points at a later root.
    let keypair = &fixture.keypair;
    let resign = |mut commit: vaultline::VersionCommit, parent| {
        commit.parent_root = parent;
        commit.signature = keypair.sign(&commit.signable_payload().to_bytes());
        commit
    };
    let c2_swapped = resign(c2.clone(), c3.parent_root);
    let c3_swapped = resign(c3.clone(), c2.parent_root);

    let store = fixture.store.clone();
    for e in [&e1, &e2, &e3] {
        store.insert_entry(e).await.unwrap();
    }
    store.append_commit(&c1, None).await.unwrap();
    store.append_commit(&c2_swapped, Some(&c1.version_root)).await.unwrap();
    store.append_commit(&c3_swapped, Some(&c2.version_root)).await.unwrap();

    let chain = VersionChain::new(store);
    let report = chain.verify_chain(&fixture.dataset).await.unwrap();
    assert!(!report.valid);

    let check = report.check(&c2_swapped.id).unwrap();
    assert!(check.merkle_valid);
    assert!(check.signature_valid);
    assert!(!check.parent_link_valid);
    assert_eq!(
        check.failures,
        vec![ChainFailure::UnknownParent(c2.version_root)]
    );
    assert!(report.check(&c1.id).unwrap().is_valid());
}

#[tokio::test]
async fn test_second_genesis_is_missing_parent() {
    let fixture = TestFixture::new();
    let e1 = fixture.make_entry("b1", None);
    let e2 = fixture.make_entry("b2", None);
    let c1 = fixture.make_commit(&[e1.clone()], None);
    let mut c2 = fixture.make_commit(&[e2.clone()], Some(&c1));
    c2.parent_root = None;
    c2.signature = fixture.keypair.sign(&c2.signable_payload().to_bytes());

    fixture.store.insert_entry(&e1).await.unwrap();
    fixture.store.insert_entry(&e2).await.unwrap();
    fixture.store.append_commit(&c1, None).await.unwrap();
    fixture.store.append_commit(&c2, Some(&c1.version_root)).await.unwrap();

    let report = VersionChain::new(fixture.store.clone())
        .verify_chain(&fixture.dataset)
        .await
        .unwrap();
    let check = report.check(&c2.id).unwrap();
    assert!(!check.parent_link_valid);
    assert_eq!(check.failures, vec![ChainFailure::MissingParent]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commit_race_never_forks() {
    init_tracing();
    let fixture = TestFixture::new();
    let store = fixture.store.clone();

    for round in 0..5 {
        fixture.stage(&format!("blob-{round}"), None).await;

        // Independent chain instances share no lock; only the store's
        // compare-and-append stands between them.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let chain = VersionChain::new(store.clone())
                    .with_signer(Signer::Local(fixture.keypair.clone()));
                let dataset = fixture.dataset.clone();
                tokio::spawn(async move { chain.commit(&dataset, None, None).await })
            })
            .collect();

        let mut appended = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => appended += 1,
                Err(e @ VaultError::ConcurrentModification { .. }) => {
                    assert_eq!(e.kind(), ErrorKind::ConcurrentModification);
                    assert!(e.is_retryable());
                }
                Err(VaultError::NothingToCommit(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(appended, 1, "round {round}");
    }

    let commits = store.list_commits(&fixture.dataset).await.unwrap();
    assert_eq!(commits.len(), 5);
    let report = VersionChain::new(store).verify_chain(&fixture.dataset).await.unwrap();
    assert!(report.valid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_chain_serializes_commits() {
    let fixture = TestFixture::new();
    let chain = Arc::new(
        VersionChain::new(fixture.store.clone())
            .with_signer(Signer::Local(fixture.keypair.clone())),
    );

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let chain = chain.clone();
            let store = fixture.store.clone();
            let entry = fixture.make_entry(&format!("blob-{i}"), None);
            let dataset = fixture.dataset.clone();
            tokio::spawn(async move {
                store.insert_entry(&entry).await.unwrap();
                chain.commit(&dataset, None, None).await
            })
        })
        .collect();

    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(VaultError::NothingToCommit(_)) => {}
            Err(e) => panic!("shared chain must not lose a race: {e}"),
        }
    }

    assert!(fixture.store.pending_entries(&fixture.dataset).await.unwrap().is_empty());
    let report = chain.verify_chain(&fixture.dataset).await.unwrap();
    assert!(report.valid);
}

#[tokio::test]
async fn test_wallet_flow_on_sqlite() {
    let fixture = TestFixture::new();
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let chain = VersionChain::new(store.clone());
    let wallet = Keypair::generate();

    for round in 0..2 {
        store
            .insert_entry(&fixture.make_entry(&format!("blob-{round}"), None))
            .await
            .unwrap();
        let prepared = chain.prepare_commit(&fixture.dataset).await.unwrap();
        let signature = wallet.sign(&prepared.signable_bytes());
        let commit = chain
            .submit_commit(
                CommitSubmission::new(prepared, signature, wallet.public_key())
                    .author("wallet")
                    .note(format!("round {round}")),
            )
            .await
            .unwrap();
        assert!(commit.verify_signature());
    }

    let report = chain.verify_chain(&fixture.dataset).await.unwrap();
    assert!(report.valid);
    assert_eq!(report.version_count, 2);

    let err = chain.prepare_commit(&fixture.dataset).await.unwrap_err();
    assert!(matches!(err, VaultError::NothingToCommit(_)));
}

#[tokio::test]
async fn test_repeated_entry_rejected_on_sqlite() {
    let fixture = TestFixture::new();
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let chain = VersionChain::new(store.clone());
    let wallet = Keypair::generate();

    let entry = fixture.make_entry("blob-1", None);
    store.insert_entry(&entry).await.unwrap();
    let mut prepared = chain.prepare_commit(&fixture.dataset).await.unwrap();
    let root = compute_manifest_root(&[entry.clone(), entry.clone()]);
    prepared.entry_ids = vec![entry.id.clone(), entry.id.clone()];
    prepared.version_root = root;
    prepared.payload.version_root = root;
    let signature = wallet.sign(&prepared.signable_bytes());

    let err = chain
        .submit_commit(CommitSubmission::new(prepared, signature, wallet.public_key()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_retryable());
    assert!(store.list_commits(&fixture.dataset).await.unwrap().is_empty());

    // The entry is still committable the normal way.
    let prepared = chain.prepare_commit(&fixture.dataset).await.unwrap();
    assert_eq!(prepared.entry_ids, vec![entry.id]);
}

#[tokio::test]
async fn test_file_custody_signer() {
    let dir = tempfile::tempdir().unwrap();
    let custody = Arc::new(FileKeyCustody::new(dir.path().join("keys/identity.json")));
    let keystore = Keystore::generate();
    custody.save(&keystore).await.unwrap();

    let fixture = TestFixture::new();
    let chain = VersionChain::new(fixture.store.clone()).with_signer(Signer::Custody(custody.clone()));
    fixture.stage("blob-1", None).await;
    let commit = chain.commit(&fixture.dataset, None, None).await.unwrap();
    assert_eq!(commit.public_key, keystore.public_key());

    // Rotating the key needs an explicit delete; old commits keep verifying.
    assert!(custody.save(&Keystore::generate()).await.is_err());
    assert!(custody.delete().await.unwrap());
    custody.save(&Keystore::generate()).await.unwrap();
    fixture.stage("blob-2", None).await;
    let rotated = chain.commit(&fixture.dataset, None, None).await.unwrap();
    assert_ne!(rotated.public_key, commit.public_key);
    assert!(chain.verify_chain(&fixture.dataset).await.unwrap().valid);
}
