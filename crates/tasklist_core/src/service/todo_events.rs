//! Events announced by `TodoStore`.

use crate::events::{Event, EventMap};
use crate::model::entity::EntityId;
use crate::model::todo::{FilterStatus, Todo};

/// Event map of the todo store.
pub struct TodoEvents;

impl EventMap for TodoEvents {}

/// A todo was created. Payload: the stored todo.
pub struct TodoAdded;

impl Event<TodoEvents> for TodoAdded {
    type Payload = Todo;
    const NAME: &'static str = "todo:added";
}

/// Title or due date changed. Payload: the merged todo.
pub struct TodoUpdated;

impl Event<TodoEvents> for TodoUpdated {
    type Payload = Todo;
    const NAME: &'static str = "todo:updated";
}

/// Completion flipped. Payload: the merged todo.
pub struct TodoToggled;

impl Event<TodoEvents> for TodoToggled {
    type Payload = Todo;
    const NAME: &'static str = "todo:toggled";
}

/// A todo was removed. Payload: its id only.
pub struct TodoDeleted;

impl Event<TodoEvents> for TodoDeleted {
    type Payload = EntityId;
    const NAME: &'static str = "todo:deleted";
}

/// The selected list filter changed.
pub struct FilterChanged;

impl Event<TodoEvents> for FilterChanged {
    type Payload = FilterStatus;
    const NAME: &'static str = "filter:changed";
}
