//! Durable medium contract for key-value entries.
//!
//! # Responsibility
//! - Define the raw string storage seam used by `KvStore`.
//! - Provide a process-local implementation with the same revision semantics.
//!
//! # Invariants
//! - A key that was never written has revision `0`.
//! - Every successful write or removal bumps the revision by exactly one.
//! - Removal keeps the key's revision, so a revision is never handed out
//!   twice for the same key.
//! - A conditional write never changes an entry whose revision differs from
//!   the expected one.

use crate::db::DbError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Monotonic write stamp of one entry.
pub type Revision = u64;

/// Revision reported for keys that were never written.
pub const ABSENT_REVISION: Revision = 0;

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage engine failure.
#[derive(Debug)]
pub enum BackendError {
    /// SQLite transport or bootstrap failure.
    Db(DbError),
    /// Engine-specific failure that has no richer representation.
    Unavailable(String),
    /// Persisted row cannot be mapped to an entry.
    InvalidData(String),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored entry: {message}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for BackendError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Serialized value plus its current revision.
///
/// `value` is `None` once the key has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: Option<String>,
    pub revision: Revision,
}

/// Result of a write attempt that reached the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Value stored; carries the new revision.
    Written(Revision),
    /// Conditional write refused; carries the revision found instead.
    Conflict { actual: Revision },
}

/// Raw key-value medium.
///
/// Implementations are synchronous and single-threaded; `KvStore` layers
/// typing, defaults and fail-soft behavior on top.
pub trait KvBackend {
    /// Reads one entry, `None` when the key was never written.
    fn read(&self, key: &str) -> BackendResult<Option<StoredEntry>>;

    /// Writes `value` under `key`.
    ///
    /// With `expected = None` the write is an unconditional overwrite.
    /// With `expected = Some(rev)` the write happens only when the current
    /// revision equals `rev` (`ABSENT_REVISION` meaning "key must be empty").
    fn write(&self, key: &str, value: &str, expected: Option<Revision>)
        -> BackendResult<WriteOutcome>;

    /// Drops the value but keeps counting the revision.
    ///
    /// Returns whether a value was removed; removing an empty key changes
    /// nothing.
    fn remove(&self, key: &str) -> BackendResult<bool>;
}

/// In-process map medium.
///
/// Shared by cloning an `Rc` around it; entries vanish with the last handle.
#[derive(Debug, Default)]
pub struct MemoryKvBackend {
    entries: RefCell<HashMap<String, StoredEntry>>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvBackend for MemoryKvBackend {
    fn read(&self, key: &str) -> BackendResult<Option<StoredEntry>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(
        &self,
        key: &str,
        value: &str,
        expected: Option<Revision>,
    ) -> BackendResult<WriteOutcome> {
        let mut entries = self.entries.borrow_mut();
        let current = entries
            .get(key)
            .map_or(ABSENT_REVISION, |entry| entry.revision);

        if let Some(expected) = expected {
            if expected != current {
                return Ok(WriteOutcome::Conflict { actual: current });
            }
        }

        let revision = current + 1;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: Some(value.to_string()),
                revision,
            },
        );
        Ok(WriteOutcome::Written(revision))
    }

    fn remove(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(key) {
            Some(entry) if entry.value.is_some() => {
                entry.value = None;
                entry.revision += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
