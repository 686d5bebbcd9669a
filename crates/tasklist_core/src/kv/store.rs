//! Typed, fail-soft key-value store.
//!
//! # Responsibility
//! - Persist one JSON-serializable value under one key.
//! - Recover locally from every persistence failure.
//!
//! # Invariants
//! - No caching: every load re-reads the medium, every save is a full overwrite.
//! - A failed save leaves the previous durable value untouched.
//! - A malformed durable value is never surfaced as an error; it is logged,
//!   counted, and replaced by the configured default on load.

use super::backend::{BackendError, KvBackend, Revision, WriteOutcome, ABSENT_REVISION};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type KvResult<T> = Result<T, KvError>;

/// Write-path failure of a key-value store.
#[derive(Debug)]
pub enum KvError {
    /// Value could not be converted to JSON.
    Serialize(serde_json::Error),
    /// Serialized value exceeds the configured capacity.
    TooLarge {
        key: String,
        size: usize,
        limit: usize,
    },
    /// Underlying medium failed.
    Backend(BackendError),
    /// Another writer changed the entry since it was read.
    StaleRevision {
        key: String,
        expected: Revision,
        actual: Revision,
    },
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to serialize value: {err}"),
            Self::TooLarge { key, size, limit } => write!(
                f,
                "value for key `{key}` is {size} bytes, exceeding the {limit} byte limit"
            ),
            Self::Backend(err) => write!(f, "{err}"),
            Self::StaleRevision {
                key,
                expected,
                actual,
            } => write!(
                f,
                "entry `{key}` changed concurrently: expected revision {expected}, found {actual}"
            ),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::TooLarge { .. } | Self::StaleRevision { .. } => None,
        }
    }
}

impl From<BackendError> for KvError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl KvError {
    fn code(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "serialize_failed",
            Self::TooLarge { .. } => "capacity_exceeded",
            Self::Backend(_) => "backend_write_failed",
            Self::StaleRevision { .. } => "stale_revision",
        }
    }
}

/// Loaded value together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<V> {
    pub revision: Revision,
    pub value: V,
}

/// Durable typed slot for one value.
pub struct KvStore<T> {
    backend: Rc<dyn KvBackend>,
    key: String,
    default: Option<T>,
    max_value_bytes: Option<usize>,
    corrupt_loads: Cell<u64>,
}

impl<T> KvStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Creates a store without default value or capacity limit.
    pub fn new(backend: Rc<dyn KvBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            default: None,
            max_value_bytes: None,
            corrupt_loads: Cell::new(0),
        }
    }

    /// Value returned by `load` when nothing usable is stored.
    pub fn with_default(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_max_value_bytes(mut self, max_value_bytes: Option<usize>) -> Self {
        self.max_value_bytes = max_value_bytes;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of loads that discarded malformed data since creation.
    pub fn corrupt_loads(&self) -> u64 {
        self.corrupt_loads.get()
    }

    /// Overwrites the durable value.
    ///
    /// Returns `false` on serialization, capacity or medium failure; the
    /// failure is logged and the prior durable value is kept.
    pub fn save(&self, value: &T) -> bool {
        self.write(value, None).is_ok()
    }

    /// Writes only when the entry is still at `expected` revision.
    ///
    /// Returns the new revision.
    ///
    /// # Errors
    /// - `KvError::StaleRevision` when another write happened in between.
    /// - Any other `KvError` from serialization, capacity or the medium.
    pub fn save_at(&self, value: &T, expected: Revision) -> KvResult<Revision> {
        self.write(value, Some(expected))
    }

    /// Loads the durable value, falling back to the default.
    ///
    /// Returns `None` only when nothing usable is stored and no default is
    /// configured.
    pub fn load(&self) -> Option<T> {
        self.load_versioned().value
    }

    /// Loads the durable value and the revision it was read at.
    ///
    /// Malformed data keeps the stored revision so a following `save_at`
    /// replaces it.
    pub fn load_versioned(&self) -> Versioned<Option<T>> {
        let entry = match self.backend.read(&self.key) {
            Ok(entry) => entry,
            Err(err) => {
                error!(
                    "event=kv_load module=kv status=error key={} error_code=backend_read_failed error={}",
                    self.key, err
                );
                return self.fallback(ABSENT_REVISION);
            }
        };

        let Some(entry) = entry else {
            return self.fallback(ABSENT_REVISION);
        };
        let Some(raw) = entry.value.as_deref() else {
            return self.fallback(entry.revision);
        };

        match serde_json::from_str::<T>(raw) {
            Ok(value) => Versioned {
                revision: entry.revision,
                value: Some(value),
            },
            Err(err) => {
                let count = self.corrupt_loads.get() + 1;
                self.corrupt_loads.set(count);
                warn!(
                    "event=kv_load module=kv status=fallback key={} revision={} corrupt_loads={} error_code=malformed_value error={}",
                    self.key, entry.revision, count, err
                );
                self.fallback(entry.revision)
            }
        }
    }

    /// Returns whether a value is stored under the key.
    ///
    /// Medium failures are logged and reported as `false`.
    pub fn exists(&self) -> bool {
        match self.backend.read(&self.key) {
            Ok(entry) => entry.is_some_and(|entry| entry.value.is_some()),
            Err(err) => {
                error!(
                    "event=kv_exists module=kv status=error key={} error={}",
                    self.key, err
                );
                false
            }
        }
    }

    /// Removes the durable value. Idempotent.
    ///
    /// The key's revision keeps counting, so a writer that read before the
    /// clear still gets `StaleRevision` from `save_at`.
    pub fn clear(&self) {
        match self.backend.remove(&self.key) {
            Ok(removed) => debug!(
                "event=kv_clear module=kv status=ok key={} removed={}",
                self.key, removed
            ),
            Err(err) => error!(
                "event=kv_clear module=kv status=error key={} error={}",
                self.key, err
            ),
        }
    }

    fn fallback(&self, revision: Revision) -> Versioned<Option<T>> {
        Versioned {
            revision,
            value: self.default.clone(),
        }
    }

    fn write(&self, value: &T, expected: Option<Revision>) -> KvResult<Revision> {
        let result = self.try_write(value, expected);
        match &result {
            Ok(revision) => debug!(
                "event=kv_save module=kv status=ok key={} revision={}",
                self.key, revision
            ),
            Err(err) => error!(
                "event=kv_save module=kv status=error key={} error_code={} error={}",
                self.key,
                err.code(),
                err
            ),
        }
        result
    }

    fn try_write(&self, value: &T, expected: Option<Revision>) -> KvResult<Revision> {
        let serialized = serde_json::to_string(value).map_err(KvError::Serialize)?;

        if let Some(limit) = self.max_value_bytes {
            if serialized.len() > limit {
                return Err(KvError::TooLarge {
                    key: self.key.clone(),
                    size: serialized.len(),
                    limit,
                });
            }
        }

        match self.backend.write(&self.key, &serialized, expected)? {
            WriteOutcome::Written(revision) => Ok(revision),
            WriteOutcome::Conflict { actual } => Err(KvError::StaleRevision {
                key: self.key.clone(),
                expected: expected.unwrap_or(ABSENT_REVISION),
                actual,
            }),
        }
    }
}
