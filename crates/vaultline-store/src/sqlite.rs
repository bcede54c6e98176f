//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use vaultline_core::{
    BlobId, CommitId, DatasetId, Ed25519PublicKey, Ed25519Signature, EntryId, ManifestEntry,
    Metadata, Sha256Hash, VersionCommit,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendResult, Store};

const ENTRY_COLUMNS: &str = "entry_id, dataset_id, blob_id, path, metadata";
const COMMIT_COLUMNS: &str = "commit_id, dataset_id, version_root, parent_root, signature, \
                              public_key, author, note, created_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion
// ─────────────────────────────────────────────────────────────────────────────

fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManifestEntry> {
    let metadata_cbor: Vec<u8> = row.get(4)?;
    let metadata: Metadata =
        ciborium::from_reader(metadata_cbor.as_slice()).map_err(|e| conversion(4, e))?;

    Ok(ManifestEntry {
        id: EntryId::new(row.get::<_, String>(0)?).map_err(|e| conversion(0, e))?,
        dataset_id: DatasetId::new(row.get::<_, String>(1)?).map_err(|e| conversion(1, e))?,
        blob_id: BlobId::new(row.get::<_, String>(2)?).map_err(|e| conversion(2, e))?,
        path: row.get(3)?,
        metadata,
    })
}

/// A commit row without its entry ids, which live in `commit_entries`.
fn row_to_commit(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionCommit> {
    let version_root: Vec<u8> = row.get(2)?;
    let parent_root: Option<Vec<u8>> = row.get(3)?;
    let signature: Vec<u8> = row.get(4)?;
    let public_key: Vec<u8> = row.get(5)?;

    Ok(VersionCommit {
        id: CommitId::new(row.get::<_, String>(0)?).map_err(|e| conversion(0, e))?,
        dataset_id: DatasetId::new(row.get::<_, String>(1)?).map_err(|e| conversion(1, e))?,
        version_root: Sha256Hash::try_from(version_root.as_slice()).map_err(|e| conversion(2, e))?,
        parent_root: parent_root
            .map(|bytes| Sha256Hash::try_from(bytes.as_slice()))
            .transpose()
            .map_err(|e| conversion(3, e))?,
        signature: Ed25519Signature::try_from(signature.as_slice())
            .map_err(|e| conversion(4, e))?,
        public_key: Ed25519PublicKey::try_from(public_key.as_slice())
            .map_err(|e| conversion(5, e))?,
        author: row.get(6)?,
        note: row.get(7)?,
        created_at: row.get(8)?,
        manifest_entry_ids: Vec::new(),
    })
}

fn load_entry_ids(conn: &Connection, commit_id: &CommitId) -> Result<Vec<EntryId>> {
    let mut stmt = conn
        .prepare_cached("SELECT entry_id FROM commit_entries WHERE commit_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![commit_id.as_str()], |row| {
            EntryId::new(row.get::<_, String>(0)?).map_err(|e| conversion(0, e))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Run a commit query and attach each commit's entry ids.
fn query_commits(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<VersionCommit>> {
    let mut stmt = conn.prepare(sql)?;
    let mut commits = stmt
        .query_map(params, row_to_commit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for commit in &mut commits {
        commit.manifest_entry_ids = load_entry_ids(conn, &commit.id)?;
    }
    Ok(commits)
}

fn insert_entry_ids(conn: &Connection, commit: &VersionCommit) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO commit_entries (commit_id, entry_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, entry_id) in commit.manifest_entry_ids.iter().enumerate() {
        stmt.execute(params![commit.id.as_str(), entry_id.as_str(), position as i64])?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_entry(&self, entry: &ManifestEntry) -> Result<()> {
        let entry = entry.clone();
        let mut metadata = Vec::new();
        ciborium::into_writer(&entry.metadata, &mut metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.run(move |conn| {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM manifest_entries WHERE entry_id = ?1",
                    params![entry.id.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::AlreadyExists(format!("entry {}", entry.id)));
            }

            conn.execute(
                "INSERT INTO manifest_entries (
                    entry_id, dataset_id, blob_id, path, metadata, inserted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.as_str(),
                    entry.dataset_id.as_str(),
                    entry.blob_id.as_str(),
                    entry.path,
                    metadata,
                    vaultline_core::now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_entry(&self, id: &EntryId) -> Result<Option<ManifestEntry>> {
        let id = id.clone();
        self.run(move |conn| {
            let entry = conn
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM manifest_entries WHERE entry_id = ?1"),
                    params![id.as_str()],
                    row_to_entry,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn get_entries(&self, ids: &[EntryId]) -> Result<Vec<ManifestEntry>> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ENTRY_COLUMNS} FROM manifest_entries WHERE entry_id = ?1"
            ))?;
            let mut entries = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(entry) = stmt.query_row(params![id.as_str()], row_to_entry).optional()? {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
        .await
    }

    async fn pending_entries(&self, dataset: &DatasetId) -> Result<Vec<ManifestEntry>> {
        let dataset = dataset.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM manifest_entries e
                 WHERE e.dataset_id = ?1
                   AND NOT EXISTS (SELECT 1 FROM commit_entries ce WHERE ce.entry_id = e.entry_id)
                 ORDER BY e.entry_id"
            ))?;
            let entries = stmt
                .query_map(params![dataset.as_str()], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn latest_commit(&self, dataset: &DatasetId) -> Result<Option<VersionCommit>> {
        let dataset = dataset.clone();
        self.run(move |conn| {
            let commits = query_commits(
                conn,
                &format!(
                    "SELECT {COMMIT_COLUMNS} FROM version_commits
                     WHERE dataset_id = ?1 ORDER BY append_seq DESC LIMIT 1"
                ),
                &[&dataset.as_str()],
            )?;
            Ok(commits.into_iter().next())
        })
        .await
    }

    async fn list_commits(&self, dataset: &DatasetId) -> Result<Vec<VersionCommit>> {
        let dataset = dataset.clone();
        self.run(move |conn| {
            query_commits(
                conn,
                &format!(
                    "SELECT {COMMIT_COLUMNS} FROM version_commits
                     WHERE dataset_id = ?1 ORDER BY created_at, commit_id"
                ),
                &[&dataset.as_str()],
            )
        })
        .await
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Option<VersionCommit>> {
        let id = id.clone();
        self.run(move |conn| {
            let commits = query_commits(
                conn,
                &format!("SELECT {COMMIT_COLUMNS} FROM version_commits WHERE commit_id = ?1"),
                &[&id.as_str()],
            )?;
            Ok(commits.into_iter().next())
        })
        .await
    }

    async fn append_commit(
        &self,
        commit: &VersionCommit,
        expected_parent: Option<&Sha256Hash>,
    ) -> Result<AppendResult> {
        let commit = commit.clone();
        let expected = expected_parent.copied();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let head: Option<(i64, Vec<u8>)> = tx
                .query_row(
                    "SELECT append_seq, version_root FROM version_commits
                     WHERE dataset_id = ?1 ORDER BY append_seq DESC LIMIT 1",
                    params![commit.dataset_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let current = head
                .as_ref()
                .map(|(_, root)| Sha256Hash::try_from(root.as_slice()))
                .transpose()
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            if current != expected {
                // Dropping the transaction rolls it back.
                return Ok(AppendResult::ParentMismatch { current });
            }

            let exists = tx
                .query_row(
                    "SELECT 1 FROM version_commits WHERE commit_id = ?1",
                    params![commit.id.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::AlreadyExists(format!("commit {}", commit.id)));
            }

            let next_seq = head.map_or(1, |(seq, _)| seq + 1);
            tx.execute(
                "INSERT INTO version_commits (
                    commit_id, dataset_id, append_seq, version_root, parent_root,
                    signature, public_key, author, note, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    commit.id.as_str(),
                    commit.dataset_id.as_str(),
                    next_seq,
                    commit.version_root.as_bytes().as_slice(),
                    commit.parent_root.as_ref().map(|r| r.as_bytes().to_vec()),
                    commit.signature.as_bytes().as_slice(),
                    commit.public_key.as_bytes().as_slice(),
                    commit.author,
                    commit.note,
                    commit.created_at,
                ],
            )?;
            insert_entry_ids(&tx, &commit)?;

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn replace_commit(&self, commit: &VersionCommit) -> Result<()> {
        let commit = commit.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let dataset: Option<String> = tx
                .query_row(
                    "SELECT dataset_id FROM version_commits WHERE commit_id = ?1",
                    params![commit.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match dataset {
                None => return Err(StoreError::NotFound(format!("commit {}", commit.id))),
                Some(d) if d != commit.dataset_id.as_str() => {
                    return Err(StoreError::InvalidData(format!(
                        "commit {} cannot move to another dataset",
                        commit.id
                    )))
                }
                Some(_) => {}
            }

            tx.execute(
                "UPDATE version_commits SET
                    version_root = ?2, parent_root = ?3, signature = ?4, public_key = ?5,
                    author = ?6, note = ?7, created_at = ?8
                 WHERE commit_id = ?1",
                params![
                    commit.id.as_str(),
                    commit.version_root.as_bytes().as_slice(),
                    commit.parent_root.as_ref().map(|r| r.as_bytes().to_vec()),
                    commit.signature.as_bytes().as_slice(),
                    commit.public_key.as_bytes().as_slice(),
                    commit.author,
                    commit.note,
                    commit.created_at,
                ],
            )?;
            tx.execute(
                "DELETE FROM commit_entries WHERE commit_id = ?1",
                params![commit.id.as_str()],
            )?;
            insert_entry_ids(&tx, &commit)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::{CommitBuilder, Keypair, MetadataValue};

    fn dataset() -> DatasetId {
        DatasetId::new("ds").unwrap()
    }

    fn entry(id: &str) -> ManifestEntry {
        let mut e = ManifestEntry::new(dataset(), BlobId::new(format!("blob-{id}")).unwrap())
            .with_path(format!("files/{id}"))
            .with_meta("size", 42i64)
            .with_meta("ratio", 0.5)
            .with_meta("tags", MetadataValue::Array(vec!["x".into(), MetadataValue::Null]));
        e.id = EntryId::new(id).unwrap();
        e
    }

    fn commit(root: u8, parent: Option<u8>, ts: i64, entries: &[&str]) -> VersionCommit {
        CommitBuilder::new(dataset(), Sha256Hash::from_bytes([root; 32]))
            .parent(parent.map(|p| Sha256Hash::from_bytes([p; 32])))
            .timestamp(ts)
            .entries(entries.iter().map(|e| EntryId::new(*e).unwrap()).collect())
            .author(Some("alice".into()))
            .sign(&Keypair::from_seed(&[1; 32]))
    }

    #[tokio::test]
    async fn test_entry_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let e = entry("a");
        store.insert_entry(&e).await.unwrap();

        let loaded = store.get_entry(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded, e);

        let err = store.insert_entry(&e).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_entry_without_path_or_metadata() {
        let store = SqliteStore::open_memory().unwrap();
        let e = ManifestEntry::new(dataset(), BlobId::new("b").unwrap());
        store.insert_entry(&e).await.unwrap();
        assert_eq!(store.get_entry(&e.id).await.unwrap(), Some(e));
    }

    #[tokio::test]
    async fn test_get_entries_skips_missing() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_entry(&entry("a")).await.unwrap();
        store.insert_entry(&entry("b")).await.unwrap();

        let ids = ["b", "zz", "a"].map(|s| EntryId::new(s).unwrap());
        let found = store.get_entries(&ids).await.unwrap();
        let found: Vec<_> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(found, ["b", "a"]);
    }

    #[tokio::test]
    async fn test_commit_roundtrip_and_pending() {
        let store = SqliteStore::open_memory().unwrap();
        for id in ["b", "a", "c"] {
            store.insert_entry(&entry(id)).await.unwrap();
        }

        let first = commit(1, None, 10, &["c", "a"]);
        assert_eq!(store.append_commit(&first, None).await.unwrap(), AppendResult::Appended);

        let loaded = store.get_commit(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded, first);
        assert!(loaded.verify_signature());

        let pending = store.pending_entries(&dataset()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_compare_and_append() {
        let store = SqliteStore::open_memory().unwrap();
        let first = commit(1, None, 10, &[]);
        let second = commit(2, Some(1), 11, &[]);
        let racer = commit(3, Some(1), 11, &[]);

        store.append_commit(&first, None).await.unwrap();
        assert_eq!(
            store.append_commit(&racer, None).await.unwrap(),
            AppendResult::ParentMismatch {
                current: Some(first.version_root)
            }
        );
        assert_eq!(
            store.append_commit(&second, Some(&first.version_root)).await.unwrap(),
            AppendResult::Appended
        );
        assert!(matches!(
            store.append_commit(&racer, Some(&first.version_root)).await.unwrap(),
            AppendResult::ParentMismatch { .. }
        ));

        let head = store.latest_commit(&dataset()).await.unwrap().unwrap();
        assert_eq!(head, second);
        assert_eq!(store.list_commits(&dataset()).await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_replace_commit() {
        let store = SqliteStore::open_memory().unwrap();
        let first = commit(1, None, 10, &["a"]);
        store.append_commit(&first, None).await.unwrap();

        let mut tampered = first.clone();
        tampered.signature = Ed25519Signature::ZERO;
        tampered.manifest_entry_ids = vec![EntryId::new("b").unwrap()];
        store.replace_commit(&tampered).await.unwrap();

        let loaded = store.get_commit(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded, tampered);
        assert!(!loaded.verify_signature());
        assert_eq!(store.latest_commit(&dataset()).await.unwrap(), Some(tampered));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        let first = commit(1, None, 10, &["a"]);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_entry(&entry("a")).await.unwrap();
            store.append_commit(&first, None).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.latest_commit(&dataset()).await.unwrap(), Some(first));
        assert!(store.pending_entries(&dataset()).await.unwrap().is_empty());
    }
}
