//! Repository layer over the key-value persistence layer.
//!
//! # Responsibility
//! - Provide a generic CRUD collection for any identified record.
//! - Keep serialization and medium details out of service orchestration.
//!
//! # Invariants
//! - The whole collection is written back after every effective mutation.
//! - Unknown ids are reported as `None`/`false`, never as errors.

pub mod repository;
