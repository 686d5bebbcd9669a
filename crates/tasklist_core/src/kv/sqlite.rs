//! SQLite implementation of the key-value medium.
//!
//! # Responsibility
//! - Map entries onto the `kv_entries` table.
//! - Perform conditional writes as single statements so a stale writer never
//!   overwrites a newer revision.
//!
//! # Invariants
//! - The connection must come from `db::open_db*` (migrations applied).
//! - `revision` column is strictly positive for every stored row.
//! - Removal sets `value` to NULL and bumps `revision`; rows are never
//!   deleted.

use super::backend::{
    BackendError, BackendResult, KvBackend, Revision, StoredEntry, WriteOutcome, ABSENT_REVISION,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::rc::Rc;

const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// Key-value medium backed by one SQLite connection.
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct SqliteKvBackend {
    conn: Rc<Connection>,
}

impl SqliteKvBackend {
    pub fn new(conn: Rc<Connection>) -> Self {
        Self { conn }
    }

    /// Returns the shared connection handle.
    pub fn connection(&self) -> &Rc<Connection> {
        &self.conn
    }

    fn current_revision(&self, key: &str) -> BackendResult<Revision> {
        let revision = self
            .conn
            .query_row(
                "SELECT revision FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        revision.map_or(Ok(ABSENT_REVISION), revision_from_db)
    }

    fn upsert(&self, key: &str, value: &str) -> BackendResult<Revision> {
        let revision = self.conn.query_row(
            &format!(
                "INSERT INTO kv_entries (key, value, revision) VALUES (?1, ?2, 1)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    revision = kv_entries.revision + 1,
                    updated_at = {NOW_MS_SQL}
                 RETURNING revision;"
            ),
            params![key, value],
            |row| row.get::<_, i64>(0),
        )?;
        revision_from_db(revision)
    }

    fn insert_if_absent(&self, key: &str, value: &str) -> BackendResult<Option<Revision>> {
        let revision = self
            .conn
            .query_row(
                "INSERT INTO kv_entries (key, value, revision) VALUES (?1, ?2, 1)
                 ON CONFLICT(key) DO NOTHING
                 RETURNING revision;",
                params![key, value],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        revision.map(revision_from_db).transpose()
    }

    fn update_if_current(
        &self,
        key: &str,
        value: &str,
        expected: Revision,
    ) -> BackendResult<Option<Revision>> {
        let expected = revision_to_db(expected)?;
        let revision = self
            .conn
            .query_row(
                &format!(
                    "UPDATE kv_entries
                     SET
                        value = ?2,
                        revision = revision + 1,
                        updated_at = {NOW_MS_SQL}
                     WHERE key = ?1 AND revision = ?3
                     RETURNING revision;"
                ),
                params![key, value, expected],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        revision.map(revision_from_db).transpose()
    }
}

impl KvBackend for SqliteKvBackend {
    fn read(&self, key: &str) -> BackendResult<Option<StoredEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT value, revision FROM kv_entries WHERE key = ?1;",
                [key],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((value, revision)) => Ok(Some(StoredEntry {
                value,
                revision: revision_from_db(revision)?,
            })),
            None => Ok(None),
        }
    }

    fn write(
        &self,
        key: &str,
        value: &str,
        expected: Option<Revision>,
    ) -> BackendResult<WriteOutcome> {
        let written = match expected {
            None => Some(self.upsert(key, value)?),
            Some(ABSENT_REVISION) => self.insert_if_absent(key, value)?,
            Some(expected) => self.update_if_current(key, value, expected)?,
        };

        match written {
            Some(revision) => Ok(WriteOutcome::Written(revision)),
            None => Ok(WriteOutcome::Conflict {
                actual: self.current_revision(key)?,
            }),
        }
    }

    fn remove(&self, key: &str) -> BackendResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE kv_entries
                 SET
                    value = NULL,
                    revision = revision + 1,
                    updated_at = {NOW_MS_SQL}
                 WHERE key = ?1 AND value IS NOT NULL;"
            ),
            [key],
        )?;
        Ok(changed > 0)
    }
}

fn revision_from_db(value: i64) -> BackendResult<Revision> {
    Revision::try_from(value).map_err(|_| {
        BackendError::InvalidData(format!(
            "invalid revision value `{value}` in kv_entries.revision"
        ))
    })
}

fn revision_to_db(value: Revision) -> BackendResult<i64> {
    i64::try_from(value)
        .map_err(|_| BackendError::InvalidData(format!("revision `{value}` out of range")))
}
