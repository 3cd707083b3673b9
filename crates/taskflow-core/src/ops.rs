//! Mutation handlers. Every operation takes the current snapshot by reference
//! and returns the replacement; nothing is edited in place.

use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::task::{Category, CategoryId, Task, TaskId, Workspace};
use crate::validate::TaskDraft;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpError {
    #[error("index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    #[error("category {0} cannot be merged into itself")]
    MergeIntoSelf(CategoryId),
}

/// What happens to tasks whose category is deleted or archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Tasks keep the dead id and display as "Uncategorized".
    #[default]
    KeepDangling,
    /// Tasks have their category cleared.
    Uncategorize,
}

impl FromStr for OrphanPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "dangling" => Ok(OrphanPolicy::KeepDangling),
            "uncategorize" | "cascade" => Ok(OrphanPolicy::Uncategorize),
            other => Err(anyhow!(
                "invalid category.delete policy: {other} (expected keep or uncategorize)"
            )),
        }
    }
}

/// Time-based identifier that never collides with `existing`.
pub fn next_id<I>(existing: I, now: DateTime<Utc>) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let after_max = existing.into_iter().max().map_or(0, |max| max.saturating_add(1));
    stamp.max(after_max)
}

#[instrument(skip(tasks))]
pub fn set_completed(tasks: &[Task], id: TaskId, completed: bool) -> Vec<Task> {
    let out: Vec<Task> = tasks
        .iter()
        .map(|task| {
            if task.id == id {
                Task {
                    completed,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect();
    info!(id, completed, "set completion");
    out
}

#[instrument(skip(tasks))]
pub fn toggle_completed(tasks: &[Task], id: TaskId) -> Result<Vec<Task>, OpError> {
    let current = tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or(OpError::TaskNotFound(id))?;
    Ok(set_completed(tasks, id, !current.completed))
}

/// Marks every task in `ids` completed. Unknown ids are ignored.
#[instrument(skip(tasks))]
pub fn bulk_complete(tasks: &[Task], ids: &[TaskId]) -> Vec<Task> {
    bulk_set_completed(tasks, ids, true)
}

#[instrument(skip(tasks))]
pub fn bulk_set_completed(tasks: &[Task], ids: &[TaskId], completed: bool) -> Vec<Task> {
    let mut touched = 0_usize;
    let out: Vec<Task> = tasks
        .iter()
        .map(|task| {
            if ids.contains(&task.id) {
                touched += 1;
                Task {
                    completed,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect();
    info!(requested = ids.len(), touched, completed, "bulk completion");
    out
}

/// Removes every task in `ids`. Callers obtain confirmation first; unknown
/// ids are ignored.
#[instrument(skip(tasks))]
pub fn delete_tasks(tasks: &[Task], ids: &[TaskId]) -> Vec<Task> {
    let out: Vec<Task> = tasks
        .iter()
        .filter(|task| !ids.contains(&task.id))
        .cloned()
        .collect();
    info!(
        requested = ids.len(),
        deleted = tasks.len() - out.len(),
        "deleted tasks"
    );
    out
}

/// Splice move on raw list positions: the item at `from` is removed and
/// reinserted at `to`.
pub fn reorder_raw<T: Clone>(items: &[T], from: usize, to: usize) -> Result<Vec<T>, OpError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(OpError::IndexOutOfRange { index, len });
        }
    }

    let mut out = items.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    debug!(from, to, len, "reordered list");
    Ok(out)
}

/// Moves a task within a displayed (filtered and/or sorted) list.
///
/// `visible` is the displayed order of ids; `from` and `to` index into it.
/// The moved task lands directly after the task displayed at `to` when moving
/// down, directly before it when moving up, so the displayed relative order
/// carries over to the underlying store.
#[instrument(skip(tasks, visible))]
pub fn reorder_visible(
    tasks: &[Task],
    visible: &[TaskId],
    from: usize,
    to: usize,
) -> Result<Vec<Task>, OpError> {
    let len = visible.len();
    let moved_id = *visible
        .get(from)
        .ok_or(OpError::IndexOutOfRange { index: from, len })?;
    let anchor_id = *visible
        .get(to)
        .ok_or(OpError::IndexOutOfRange { index: to, len })?;

    if from == to {
        return Ok(tasks.to_vec());
    }

    let mut out = tasks.to_vec();
    let raw_from = out
        .iter()
        .position(|t| t.id == moved_id)
        .ok_or(OpError::TaskNotFound(moved_id))?;
    let moved = out.remove(raw_from);

    let raw_anchor = out
        .iter()
        .position(|t| t.id == anchor_id)
        .ok_or(OpError::TaskNotFound(anchor_id))?;
    let insert_at = if from < to { raw_anchor + 1 } else { raw_anchor };
    out.insert(insert_at, moved);

    info!(moved_id, anchor_id, from, to, "reordered task");
    Ok(out)
}

#[instrument(skip(tasks, draft, now))]
pub fn create_task(tasks: &[Task], draft: &TaskDraft, now: DateTime<Utc>) -> (Vec<Task>, TaskId) {
    let id = next_id(tasks.iter().map(|t| t.id), now);
    let mut task = Task::new(id, draft.title.trim().to_string(), now);
    draft.apply_to(&mut task);

    let mut out = tasks.to_vec();
    out.push(task);
    info!(id, "created task");
    (out, id)
}

/// Replaces the editable fields of task `id`, keeping its id and creation
/// time and stamping `updated_at`.
#[instrument(skip(tasks, draft, now))]
pub fn update_task(
    tasks: &[Task],
    id: TaskId,
    draft: &TaskDraft,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, OpError> {
    if !tasks.iter().any(|t| t.id == id) {
        return Err(OpError::TaskNotFound(id));
    }

    let out = tasks
        .iter()
        .map(|task| {
            if task.id != id {
                return task.clone();
            }
            let mut edited = task.clone();
            edited.title = draft.title.trim().to_string();
            draft.apply_to(&mut edited);
            edited.updated_at = Some(now);
            edited
        })
        .collect();
    info!(id, "updated task");
    Ok(out)
}

/// Completes every task filed under `category_id`.
#[instrument(skip(tasks))]
pub fn complete_category(tasks: &[Task], category_id: CategoryId) -> Vec<Task> {
    let ids: Vec<TaskId> = tasks
        .iter()
        .filter(|t| t.category_id == Some(category_id))
        .map(|t| t.id)
        .collect();
    bulk_complete(tasks, &ids)
}

#[instrument(skip(categories, now))]
pub fn create_category(
    categories: &[Category],
    name: &str,
    color: &str,
    now: DateTime<Utc>,
) -> (Vec<Category>, CategoryId) {
    let id = next_id(categories.iter().map(|c| c.id), now);
    let mut out = categories.to_vec();
    out.push(Category::new(id, name.trim().to_string(), color.trim().to_string(), now));
    info!(id, name, "created category");
    (out, id)
}

fn edit_category<F>(
    categories: &[Category],
    id: CategoryId,
    edit: F,
) -> Result<Vec<Category>, OpError>
where
    F: Fn(&mut Category),
{
    if !categories.iter().any(|c| c.id == id) {
        return Err(OpError::CategoryNotFound(id));
    }
    Ok(categories
        .iter()
        .map(|c| {
            let mut c = c.clone();
            if c.id == id {
                edit(&mut c);
            }
            c
        })
        .collect())
}

#[instrument(skip(categories))]
pub fn rename_category(
    categories: &[Category],
    id: CategoryId,
    name: &str,
) -> Result<Vec<Category>, OpError> {
    let out = edit_category(categories, id, |c| c.name = name.trim().to_string())?;
    info!(id, name, "renamed category");
    Ok(out)
}

#[instrument(skip(categories))]
pub fn recolor_category(
    categories: &[Category],
    id: CategoryId,
    color: &str,
) -> Result<Vec<Category>, OpError> {
    let out = edit_category(categories, id, |c| c.color = color.trim().to_string())?;
    info!(id, color, "recolored category");
    Ok(out)
}

/// Reassigns every task in a source category to `target`, then drops the
/// source categories. No task is removed.
#[instrument(skip(ws))]
pub fn merge_categories(
    ws: &Workspace,
    sources: &[CategoryId],
    target: CategoryId,
) -> Result<Workspace, OpError> {
    if sources.contains(&target) {
        return Err(OpError::MergeIntoSelf(target));
    }
    if ws.category(target).is_none() {
        return Err(OpError::CategoryNotFound(target));
    }

    let mut reassigned = 0_usize;
    let tasks = ws
        .tasks
        .iter()
        .map(|task| match task.category_id {
            Some(id) if sources.contains(&id) => {
                reassigned += 1;
                Task {
                    category_id: Some(target),
                    ..task.clone()
                }
            }
            _ => task.clone(),
        })
        .collect();
    let categories = ws
        .categories
        .iter()
        .filter(|c| !sources.contains(&c.id))
        .cloned()
        .collect();

    info!(?sources, target, reassigned, "merged categories");
    Ok(Workspace {
        tasks,
        categories,
        ..ws.clone()
    })
}

/// Removes the listed categories. Under [`OrphanPolicy::KeepDangling`] the
/// tasks still point at the removed ids.
#[instrument(skip(ws))]
pub fn remove_categories(ws: &Workspace, ids: &[CategoryId], policy: OrphanPolicy) -> Workspace {
    let categories: Vec<Category> = ws
        .categories
        .iter()
        .filter(|c| !ids.contains(&c.id))
        .cloned()
        .collect();

    let orphans = ws
        .tasks
        .iter()
        .filter(|t| t.category_id.is_some_and(|id| ids.contains(&id)))
        .count();

    let tasks = match policy {
        OrphanPolicy::KeepDangling => {
            if orphans > 0 {
                warn!(orphans, "tasks keep references to removed categories");
            }
            ws.tasks.clone()
        }
        OrphanPolicy::Uncategorize => ws
            .tasks
            .iter()
            .map(|task| match task.category_id {
                Some(id) if ids.contains(&id) => Task {
                    category_id: None,
                    ..task.clone()
                },
                _ => task.clone(),
            })
            .collect(),
    };

    info!(
        removed = ws.categories.len() - categories.len(),
        orphans,
        ?policy,
        "removed categories"
    );
    Workspace {
        tasks,
        categories,
        ..ws.clone()
    }
}

#[instrument(skip(ws))]
pub fn delete_category(
    ws: &Workspace,
    id: CategoryId,
    policy: OrphanPolicy,
) -> Result<Workspace, OpError> {
    if ws.category(id).is_none() {
        return Err(OpError::CategoryNotFound(id));
    }
    Ok(remove_categories(ws, &[id], policy))
}

/// Recomputes each category's cached task count from `tasks`.
pub fn refresh_task_counts(categories: &[Category], tasks: &[Task]) -> Vec<Category> {
    categories
        .iter()
        .map(|c| Category {
            task_count: tasks
                .iter()
                .filter(|t| t.category_id == Some(c.id))
                .count() as u64,
            ..c.clone()
        })
        .collect()
}
