//! Key-value persistence layer.
//!
//! # Responsibility
//! - Keep exactly one serialized value per string key on a durable medium.
//! - Hide medium choice (SQLite file, in-memory) behind `KvBackend`.
//!
//! # Invariants
//! - Values are stored as JSON text.
//! - Each entry carries a revision stamp used to detect concurrent writers.

pub mod backend;
pub mod sqlite;
pub mod store;

pub use backend::{
    BackendError, BackendResult, KvBackend, MemoryKvBackend, Revision, StoredEntry, WriteOutcome,
    ABSENT_REVISION,
};
pub use sqlite::SqliteKvBackend;
pub use store::{KvError, KvResult, KvStore, Versioned};
