//! Generic collection repository over a key-value store.
//!
//! # Responsibility
//! - Provide CRUD and equality filtering for any `Entity`.
//! - Persist the entire collection after every mutation.
//!
//! # Invariants
//! - Reads always reflect the latest durable state (no in-memory cache).
//! - Insertion order is preserved.
//! - Mutations that change nothing do not write.
//! - Writes are conditioned on the revision observed by the read, so a
//!   concurrent writer makes the mutation fail instead of being overwritten.

use crate::config::StoreConfig;
use crate::kv::{KvBackend, KvError, KvStore, Revision, Versioned};
use crate::model::entity::{Entity, EntityId};
use log::{debug, error};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository write failure.
#[derive(Debug)]
pub enum RepoError {
    /// The collection could not be written back.
    Persist(KvError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persist(err) => write!(f, "failed to persist collection: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persist(err) => Some(err),
        }
    }
}

impl From<KvError> for RepoError {
    fn from(value: KvError) -> Self {
        Self::Persist(value)
    }
}

impl RepoError {
    /// Returns whether the failure came from a concurrent writer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Persist(KvError::StaleRevision { .. }))
    }
}

/// CRUD collection of `T`, stored as one JSON array.
pub struct Repository<T> {
    store: KvStore<Vec<T>>,
}

impl<T: Entity> Repository<T> {
    /// Creates a repository over `key` with no capacity limit.
    pub fn new(backend: Rc<dyn KvBackend>, key: impl Into<String>) -> Self {
        Self::from_store(KvStore::new(backend, key))
    }

    /// Creates a repository using key and limits from `config`.
    pub fn from_config(backend: Rc<dyn KvBackend>, config: &StoreConfig) -> Self {
        Self::from_store(
            KvStore::new(backend, config.storage_key.as_str())
                .with_max_value_bytes(config.max_value_bytes),
        )
    }

    /// Wraps an existing store; its default is forced to an empty collection.
    pub fn from_store(store: KvStore<Vec<T>>) -> Self {
        Self {
            store: store.with_default(Vec::new()),
        }
    }

    pub fn key(&self) -> &str {
        self.store.key()
    }

    /// Loads that fell back to an empty collection because of malformed data.
    pub fn corrupt_loads(&self) -> u64 {
        self.store.corrupt_loads()
    }

    /// Returns the full persisted collection.
    pub fn get_all(&self) -> Vec<T> {
        self.store.load().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get_all().is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<T> {
        self.get_all().into_iter().find(|item| item.id() == id)
    }

    /// Appends a new entity with a freshly generated id.
    ///
    /// # Errors
    /// - `RepoError::Persist` when the collection cannot be written; the
    ///   returned entity is then not durable and must be treated as not added.
    pub fn add(&self, draft: T::Draft) -> RepoResult<T> {
        let (revision, mut items) = self.snapshot();
        let id = fresh_id(&items);
        let item = T::from_draft(id, draft);
        items.push(item.clone());

        self.persist(&items, revision, "repo_add")?;
        debug!(
            "event=repo_add module=repo status=ok key={} id={} count={}",
            self.key(),
            item.id(),
            items.len()
        );
        Ok(item)
    }

    /// Shallow-merges `patch` onto the entity with `id`.
    ///
    /// Returns `Ok(None)` without writing when `id` is unknown.
    ///
    /// # Errors
    /// - `RepoError::Persist` when the collection cannot be written.
    pub fn update(&self, id: &str, patch: T::Patch) -> RepoResult<Option<T>> {
        self.update_with(id, |_| patch)
    }

    /// Shallow-merges the patch built by `make_patch` from the current entity.
    ///
    /// `make_patch` sees the entity from the snapshot the write is
    /// conditioned on.
    ///
    /// # Errors
    /// - `RepoError::Persist` when the collection cannot be written,
    ///   including a concurrent change since the snapshot.
    pub fn update_with<F>(&self, id: &str, make_patch: F) -> RepoResult<Option<T>>
    where
        F: FnOnce(&T) -> T::Patch,
    {
        let (revision, mut items) = self.snapshot();
        let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
            debug!(
                "event=repo_update module=repo status=not_found key={} id={}",
                self.key(),
                id
            );
            return Ok(None);
        };

        let patch = make_patch(item);
        item.merge(patch);
        let merged = item.clone();

        self.persist(&items, revision, "repo_update")?;
        debug!(
            "event=repo_update module=repo status=ok key={} id={}",
            self.key(),
            id
        );
        Ok(Some(merged))
    }

    /// Removes the entity with `id`.
    ///
    /// Returns `Ok(false)` without writing when nothing matched.
    ///
    /// # Errors
    /// - `RepoError::Persist` when the collection cannot be written.
    pub fn delete(&self, id: &str) -> RepoResult<bool> {
        let (revision, mut items) = self.snapshot();
        let before = items.len();
        items.retain(|item| item.id() != id);

        if items.len() == before {
            debug!(
                "event=repo_delete module=repo status=not_found key={} id={}",
                self.key(),
                id
            );
            return Ok(false);
        }

        self.persist(&items, revision, "repo_delete")?;
        debug!(
            "event=repo_delete module=repo status=ok key={} id={} count={}",
            self.key(),
            id,
            items.len()
        );
        Ok(true)
    }

    /// Returns entities whose `property` equals `value`, in collection order.
    ///
    /// `property` projects the compared field, e.g. `|todo| &todo.completed`.
    pub fn filter<V, F>(&self, property: F, value: &V) -> Vec<T>
    where
        V: PartialEq + ?Sized,
        F: Fn(&T) -> &V,
    {
        self.get_all()
            .into_iter()
            .filter(|item| property(item) == value)
            .collect()
    }

    fn snapshot(&self) -> (Revision, Vec<T>) {
        let Versioned { revision, value } = self.store.load_versioned();
        (revision, value.unwrap_or_default())
    }

    fn persist(&self, items: &Vec<T>, revision: Revision, event: &str) -> RepoResult<()> {
        self.store.save_at(items, revision).map_err(|err| {
            error!(
                "event={} module=repo status=error key={} revision={} error={}",
                event,
                self.key(),
                revision,
                err
            );
            RepoError::from(err)
        })?;
        Ok(())
    }
}

fn fresh_id<T: Entity>(items: &[T]) -> EntityId {
    loop {
        let candidate = Uuid::new_v4().to_string();
        if items.iter().all(|item| item.id() != candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Repository;
    use crate::kv::MemoryKvBackend;
    use crate::model::todo::{Todo, TodoDraft, TodoPatch};
    use std::rc::Rc;

    fn repo() -> Repository<Todo> {
        Repository::new(Rc::new(MemoryKvBackend::new()), "todos")
    }

    #[test]
    fn update_unknown_id_does_not_write() {
        let repo = repo();
        assert!(repo.update("missing", TodoPatch::title("x")).unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[test]
    fn update_with_derives_patch_from_stored_entity() {
        let repo = repo();
        let todo = repo.add(TodoDraft::new("flip me")).unwrap();

        let flipped = repo
            .update_with(&todo.id, |current| TodoPatch::completed(!current.completed))
            .unwrap()
            .unwrap();
        assert!(flipped.completed);

        let back = repo
            .update_with(&todo.id, |current| TodoPatch::completed(!current.completed))
            .unwrap()
            .unwrap();
        assert!(!back.completed);
        assert!(repo
            .update_with("missing", |_| TodoPatch::completed(true))
            .unwrap()
            .is_none());
    }

    #[test]
    fn filter_preserves_order() {
        let repo = repo();
        let a = repo.add(TodoDraft::new("a")).unwrap();
        repo.add(TodoDraft::new("b")).unwrap();
        let c = repo.add(TodoDraft::new("c")).unwrap();
        repo.update(&a.id, TodoPatch::completed(true)).unwrap();
        repo.update(&c.id, TodoPatch::completed(true)).unwrap();

        let done: Vec<String> = repo
            .filter(|todo| &todo.completed, &true)
            .into_iter()
            .map(|todo| todo.title)
            .collect();
        assert_eq!(done, vec!["a", "c"]);
    }

    #[test]
    fn filter_by_unsized_string_field() {
        let repo = repo();
        repo.add(TodoDraft::new("tea")).unwrap();
        repo.add(TodoDraft::new("milk")).unwrap();

        let hits = repo.filter(|todo| todo.title.as_str(), "milk");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "milk");
    }
}
