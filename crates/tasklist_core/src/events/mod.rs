//! Event notification layer.
//!
//! # Responsibility
//! - Let consumers react to mutations without polling.
//! - Keep event names and payload types declared in one closed map per bus.

pub mod bus;

pub use bus::{
    listener, EmitError, Event, EventBus, EventMap, Listener, ListenerError, ListenerResult,
};
