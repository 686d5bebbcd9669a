//! Observable todo store.
//!
//! # Responsibility
//! - Provide the todo use-cases consumed by view layers.
//! - Persist every mutation through the repository, then announce it.
//!
//! # Invariants
//! - An event is emitted if and only if the mutation took effect durably.
//! - Unknown ids are reported as `None`/`false` and emit nothing.
//! - Reads never emit and never write.
//! - Listeners may call back into the store; nested mutations complete
//!   before the outer call returns.

use crate::config::StoreConfig;
use crate::events::{EmitError, Event, EventBus, Listener};
use crate::kv::KvBackend;
use crate::model::todo::{
    normalize_title, FilterStatus, Todo, TodoDraft, TodoPatch, TodoValidationError,
};
use crate::repo::repository::{RepoError, Repository};
use crate::service::todo_events::{
    FilterChanged, TodoAdded, TodoDeleted, TodoEvents, TodoToggled, TodoUpdated,
};
use log::info;
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Service error for todo use-cases.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected before reaching the repository.
    Validation(TodoValidationError),
    /// Persistence failure; nothing was announced.
    Repo(RepoError),
    /// A listener failed after the mutation was persisted.
    Listener(EmitError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Listener(err) => write!(f, "change persisted but not fully announced: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Listener(err) => Some(err),
        }
    }
}

impl From<TodoValidationError> for StoreError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<EmitError> for StoreError {
    fn from(value: EmitError) -> Self {
        Self::Listener(value)
    }
}

/// Todo facade combining a repository and an event bus.
pub struct TodoStore {
    repo: Repository<Todo>,
    events: EventBus<TodoEvents>,
    selected_filter: Cell<FilterStatus>,
}

impl TodoStore {
    /// Creates a store over an existing repository.
    pub fn new(repo: Repository<Todo>) -> Self {
        Self {
            repo,
            events: EventBus::new(),
            selected_filter: Cell::new(FilterStatus::All),
        }
    }

    /// Creates a store persisting under `config.storage_key` on `backend`.
    pub fn open(backend: Rc<dyn KvBackend>, config: &StoreConfig) -> Self {
        let store = Self::new(Repository::from_config(backend, config));
        info!(
            "event=store_open module=service status=ok key={} todos={}",
            config.storage_key,
            store.repo.len()
        );
        store
    }

    pub fn repository(&self) -> &Repository<Todo> {
        &self.repo
    }

    pub fn on<E: Event<TodoEvents>>(&self, listener: Listener<E::Payload>) {
        self.events.on::<E>(listener);
    }

    pub fn off<E: Event<TodoEvents>>(&self, listener: &Listener<E::Payload>) -> bool {
        self.events.off::<E>(listener)
    }

    pub fn listener_count<E: Event<TodoEvents>>(&self) -> usize {
        self.events.listener_count::<E>()
    }

    /// Creates a pending todo.
    ///
    /// # Errors
    /// - `StoreError::Validation` for a blank title.
    /// - `StoreError::Repo` when the collection cannot be saved.
    /// - `StoreError::Listener` when a `todo:added` listener fails.
    pub fn add_todo(&self, title: &str) -> StoreResult<Todo> {
        self.create(TodoDraft::new(normalize_title(title)?))
    }

    /// Creates a pending todo with a due date.
    pub fn add_todo_with_due(&self, title: &str, due_date: &str) -> StoreResult<Todo> {
        self.create(TodoDraft::new(normalize_title(title)?).with_due_date(due_date))
    }

    /// Flips `completed` of the todo with `id`.
    ///
    /// A concurrent change between read and write fails with
    /// `StoreError::Repo` instead of being undone.
    pub fn toggle_todo(&self, id: &str) -> StoreResult<Option<Todo>> {
        let updated = self
            .repo
            .update_with(id, |current| TodoPatch::completed(!current.completed))?;
        self.announce_some::<TodoToggled>(updated)
    }

    /// Replaces the title of the todo with `id`.
    pub fn edit_todo(&self, id: &str, title: &str) -> StoreResult<Option<Todo>> {
        let title = normalize_title(title)?;
        let updated = self.repo.update(id, TodoPatch::title(title))?;
        self.announce_some::<TodoUpdated>(updated)
    }

    /// Sets or clears the due date of the todo with `id`.
    pub fn set_due_date(&self, id: &str, due_date: Option<&str>) -> StoreResult<Option<Todo>> {
        let patch = TodoPatch::due_date(due_date.map(str::to_string));
        let updated = self.repo.update(id, patch)?;
        self.announce_some::<TodoUpdated>(updated)
    }

    /// Removes the todo with `id`; announces the bare id.
    pub fn delete_todo(&self, id: &str) -> StoreResult<bool> {
        if !self.repo.delete(id)? {
            return Ok(false);
        }
        self.events.emit::<TodoDeleted>(&id.to_string())?;
        Ok(true)
    }

    /// Selects the filter used by `visible_todos`.
    ///
    /// Returns whether the selection changed; `filter:changed` is emitted
    /// only in that case.
    pub fn select_filter(&self, status: FilterStatus) -> StoreResult<bool> {
        if self.selected_filter.replace(status) == status {
            return Ok(false);
        }
        self.events.emit::<FilterChanged>(&status)?;
        Ok(true)
    }

    pub fn selected_filter(&self) -> FilterStatus {
        self.selected_filter.get()
    }

    /// Returns todos matching `status`, in insertion order.
    pub fn get_todos(&self, status: FilterStatus) -> Vec<Todo> {
        match status.completed() {
            Some(completed) => self.repo.filter(|todo| &todo.completed, &completed),
            None => self.repo.get_all(),
        }
    }

    /// Returns todos matching the selected filter.
    pub fn visible_todos(&self) -> Vec<Todo> {
        self.get_todos(self.selected_filter())
    }

    pub fn find_todo(&self, id: &str) -> Option<Todo> {
        self.repo.find_by_id(id)
    }

    fn create(&self, draft: TodoDraft) -> StoreResult<Todo> {
        let todo = self.repo.add(draft)?;
        self.events.emit::<TodoAdded>(&todo)?;
        Ok(todo)
    }

    fn announce_some<E>(&self, updated: Option<Todo>) -> StoreResult<Option<Todo>>
    where
        E: Event<TodoEvents, Payload = Todo>,
    {
        if let Some(todo) = &updated {
            self.events.emit::<E>(todo)?;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreError, TodoStore};
    use crate::config::StoreConfig;
    use crate::kv::MemoryKvBackend;
    use crate::model::todo::{FilterStatus, TodoValidationError};
    use std::rc::Rc;

    fn store() -> TodoStore {
        TodoStore::open(Rc::new(MemoryKvBackend::new()), &StoreConfig::default())
    }

    #[test]
    fn blank_titles_are_rejected_without_writing() {
        let store = store();
        let err = store.add_todo("   ").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(TodoValidationError::EmptyTitle)
        ));
        assert!(store.get_todos(FilterStatus::All).is_empty());
    }

    #[test]
    fn titles_are_trimmed() {
        let store = store();
        let todo = store.add_todo("  Buy milk ").unwrap();
        assert_eq!(todo.title, "Buy milk");
    }

    #[test]
    fn select_filter_reports_changes_only() {
        let store = store();
        assert!(!store.select_filter(FilterStatus::All).unwrap());
        assert!(store.select_filter(FilterStatus::Completed).unwrap());
        assert_eq!(store.selected_filter(), FilterStatus::Completed);
    }
}
