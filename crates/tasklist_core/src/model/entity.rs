//! Identified-record contract used by the generic repository.
//!
//! # Invariants
//! - `id` is assigned once by the repository and never changes.
//! - A `Patch` cannot carry an id, so merging can never rewrite identity.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Opaque identity of a stored entity.
pub type EntityId = String;

/// Record that can live in a `Repository`.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Creation input: the entity without its id.
    type Draft;
    /// Partial update; unset fields keep their current value.
    type Patch;

    fn id(&self) -> &str;

    /// Builds the full entity once the repository has chosen an id.
    fn from_draft(id: EntityId, draft: Self::Draft) -> Self;

    /// Shallow-merges `patch` onto `self`.
    fn merge(&mut self, patch: Self::Patch);
}
