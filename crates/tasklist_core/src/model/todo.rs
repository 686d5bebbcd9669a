//! Todo domain model.
//!
//! # Responsibility
//! - Define the persisted todo record and its wire shape.
//! - Provide creation/update inputs and the list filter.
//!
//! # Invariants
//! - `completed` is always present on a stored todo.
//! - `title` is non-empty after trimming whenever a caller creates or edits it.
//! - `dueDate` is omitted from JSON when unset.

use super::entity::{Entity, EntityId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted todo record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: EntityId,
    pub title: String,
    pub completed: bool,
    /// Free-form date text supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Todo without an id, as handed to `Repository::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoDraft {
    pub title: String,
    pub completed: bool,
    pub due_date: Option<String>,
}

impl TodoDraft {
    /// New pending todo without a due date.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }
}

/// Partial todo update.
///
/// `due_date: Some(None)` clears the date; `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<String>>,
}

impl TodoPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn due_date(due_date: Option<String>) -> Self {
        Self {
            due_date: Some(due_date),
            ..Self::default()
        }
    }
}

impl Entity for Todo {
    type Draft = TodoDraft;
    type Patch = TodoPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_draft(id: EntityId, draft: TodoDraft) -> Self {
        Self {
            id,
            title: draft.title,
            completed: draft.completed,
            due_date: draft.due_date,
        }
    }

    fn merge(&mut self, patch: TodoPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }
}

/// List filter for todo reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStatus {
    /// No filtering.
    #[default]
    All,
    /// `completed == false`.
    Pending,
    /// `completed == true`.
    Completed,
}

impl FilterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Completion flag selected by this filter, `None` for `All`.
    pub fn completed(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Pending => Some(false),
            Self::Completed => Some(true),
        }
    }
}

impl Display for FilterStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-side validation failure for todo input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoValidationError {
    EmptyTitle,
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "todo title must not be empty"),
        }
    }
}

impl Error for TodoValidationError {}

/// Trims `title` and rejects blank input.
pub fn normalize_title(title: &str) -> Result<String, TodoValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TodoValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}
