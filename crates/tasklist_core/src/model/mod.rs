//! Domain model for persisted collections.
//!
//! # Responsibility
//! - Define the identified-record contract shared by repositories.
//! - Define the todo record, its creation/update inputs and filters.
//!
//! # Invariants
//! - Every record is identified by a stable string id.
//! - Records are plain values; callers receive copies, never live references.

pub mod entity;
pub mod todo;
