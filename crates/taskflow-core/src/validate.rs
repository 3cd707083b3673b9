use chrono::NaiveDate;
use thiserror::Error;

use crate::task::{CategoryId, Priority, Task};

pub const DEFAULT_TITLE_MAX: usize = 100;
pub const DEFAULT_DESCRIPTION_MAX: usize = 500;

/// Editable fields of a task, as filled in by a user before saving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category_id: Option<CategoryId>,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub completed: bool,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority,
            category_id: task.category_id,
            due_date: task.due_date,
            tags: task.tags.clone(),
            completed: task.completed,
        }
    }

    /// Adds `tag` when absent, removes it when present.
    pub fn toggle_tag(&mut self, tag: &str) {
        if let Some(idx) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(idx);
        } else {
            self.tags.push(tag.to_string());
        }
    }

    /// Copies everything except the title onto `task`.
    pub(crate) fn apply_to(&self, task: &mut Task) {
        task.description = if self.description.is_empty() {
            None
        } else {
            Some(self.description.clone())
        };
        task.priority = self.priority;
        task.category_id = self.category_id;
        task.due_date = self.due_date;
        task.tags = self.tags.clone();
        task.completed = self.completed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub title_max: usize,
    pub description_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            title_max: DEFAULT_TITLE_MAX,
            description_max: DEFAULT_DESCRIPTION_MAX,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task title is required")]
    TitleRequired,

    #[error("Title must be less than {max} characters")]
    TitleTooLong { max: usize },

    #[error("Description must be less than {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("Due date cannot be in the past")]
    DueDateInPast,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", join_messages(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks every rule and reports all failures at once; at most one error per
/// field.
pub fn validate_draft(
    draft: &TaskDraft,
    today: NaiveDate,
    limits: Limits,
) -> Result<(), ValidationErrors> {
    check_draft(draft, today, limits, true)
}

/// Validates an edit of `original`. A due date carried over unchanged may
/// already have passed; only a newly set one must not be in the past.
pub fn validate_edit(
    draft: &TaskDraft,
    original: &Task,
    today: NaiveDate,
    limits: Limits,
) -> Result<(), ValidationErrors> {
    check_draft(draft, today, limits, draft.due_date != original.due_date)
}

fn check_draft(
    draft: &TaskDraft,
    today: NaiveDate,
    limits: Limits,
    check_due: bool,
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push(ValidationError::TitleRequired);
    } else if draft.title.chars().count() > limits.title_max {
        errors.push(ValidationError::TitleTooLong {
            max: limits.title_max,
        });
    }

    if draft.description.chars().count() > limits.description_max {
        errors.push(ValidationError::DescriptionTooLong {
            max: limits.description_max,
        });
    }

    if check_due && draft.due_date.is_some_and(|due| due < today) {
        errors.push(ValidationError::DueDateInPast);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = errors.len(), "task draft failed validation");
        Err(ValidationErrors(errors))
    }
}
