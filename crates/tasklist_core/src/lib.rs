//! Core of the personal task list.
//! An observable, persisted collection: key-value persistence, a generic
//! repository on top of it, and a typed event bus, composed into `TodoStore`.

pub mod config;
pub mod db;
pub mod events;
pub mod kv;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::StoreConfig;
pub use events::{listener, EmitError, Event, EventBus, EventMap, Listener, ListenerError};
pub use kv::{KvBackend, KvError, KvStore, MemoryKvBackend, SqliteKvBackend};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityId};
pub use model::todo::{FilterStatus, Todo, TodoDraft, TodoPatch, TodoValidationError};
pub use repo::repository::{RepoError, RepoResult, Repository};
pub use service::todo_events::{
    FilterChanged, TodoAdded, TodoDeleted, TodoEvents, TodoToggled, TodoUpdated,
};
pub use service::todo_store::{StoreError, StoreResult, TodoStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
