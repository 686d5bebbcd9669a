//! SQLite medium for the `kv_entries` table.
//!
//! # Responsibility
//! - Hand out connections whose `kv_entries` schema is current.
//! - Refuse files written by a newer schema instead of guessing their layout.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - `SqliteKvBackend` only ever sees connections returned from this module.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open or prepare the key-value database.
#[derive(Debug)]
pub enum DbError {
    /// Statement, pragma or file access failed inside SQLite.
    Sqlite(rusqlite::Error),
    /// The file's `kv_entries` schema is newer than this build understands.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "kv_entries schema v{found} is newer than supported v{supported}; upgrade tasklist"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
