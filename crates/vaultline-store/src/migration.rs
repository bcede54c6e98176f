//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration transforms the schema
//! from version N to N+1 inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, vaultline_core::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: entries, commits, and the commit -> entry join.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Manifest entries: immutable blob references
        CREATE TABLE manifest_entries (
            entry_id TEXT PRIMARY KEY,
            dataset_id TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            path TEXT,                        -- nullable
            metadata BLOB NOT NULL,           -- CBOR map
            inserted_at INTEGER NOT NULL      -- local timestamp (Unix ms)
        );

        -- Version commits: append-only per dataset
        CREATE TABLE version_commits (
            commit_id TEXT PRIMARY KEY,
            dataset_id TEXT NOT NULL,
            append_seq INTEGER NOT NULL,      -- 1-based position in append order
            version_root BLOB NOT NULL,       -- 32 bytes
            parent_root BLOB,                 -- 32 bytes, NULL for the first commit
            signature BLOB NOT NULL,          -- 64 bytes
            public_key BLOB NOT NULL,         -- 32 bytes
            author TEXT,
            note TEXT,
            created_at INTEGER NOT NULL,      -- signed timestamp (Unix ms)

            UNIQUE(dataset_id, append_seq)
        );

        -- Which entries each commit covers
        CREATE TABLE commit_entries (
            commit_id TEXT NOT NULL,
            entry_id TEXT NOT NULL,
            position INTEGER NOT NULL,        -- order within manifest_entry_ids
            PRIMARY KEY (commit_id, entry_id)
        );

        CREATE INDEX idx_entries_dataset ON manifest_entries(dataset_id, entry_id);
        CREATE INDEX idx_commits_dataset_created ON version_commits(dataset_id, created_at);
        CREATE INDEX idx_commit_entries_entry ON commit_entries(entry_id);
        "#,
    )?;

    Ok(())
}
