//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Announce effective mutations to subscribers.
//! - Keep view layers decoupled from storage details.

pub mod todo_events;
pub mod todo_store;
