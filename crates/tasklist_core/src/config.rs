//! Store configuration passed explicitly by the composition root.
//!
//! # Invariants
//! - There is no process-wide store; every store is built from one of these.
//! - `max_value_bytes = None` disables the capacity check.

/// Default key under which the todo collection is persisted.
pub const DEFAULT_STORAGE_KEY: &str = "todos";

/// Default per-entry capacity, in serialized bytes.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 5 * 1024 * 1024;

/// Settings for one persisted collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Key of the single entry holding the serialized collection.
    pub storage_key: String,
    /// Largest serialized value a save may write.
    pub max_value_bytes: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_value_bytes: Some(DEFAULT_MAX_VALUE_BYTES),
        }
    }
}

impl StoreConfig {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ..Self::default()
        }
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_max_value_bytes(mut self, max_value_bytes: Option<usize>) -> Self {
        self.max_value_bytes = max_value_bytes;
        self
    }
}
