use std::collections::BTreeMap;

use crate::task::{Category, CategoryId, Priority, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }

    /// Whole-number completion percentage, rounded down; 0 for no tasks.
    pub fn completion_percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.completed * 100 / self.total
        }
    }
}

/// Per-dimension counts shown next to the search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    pub counts: TaskCounts,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_category: BTreeMap<CategoryId, usize>,
}

impl Facets {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut by_priority = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for task in tasks {
            *by_priority.entry(task.priority).or_insert(0_usize) += 1;
            if let Some(id) = task.category_id {
                *by_category.entry(id).or_insert(0_usize) += 1;
            }
        }

        Self {
            counts: TaskCounts::from_tasks(tasks),
            by_priority,
            by_category,
        }
    }

    pub fn priority(&self, priority: Priority) -> usize {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats<'a> {
    pub categories: usize,
    pub total_tasks: u64,
    pub most_used: Option<&'a Category>,
    pub average_tasks: f64,
}

impl<'a> CategoryStats<'a> {
    /// Built from the cached `task_count` on each category.
    pub fn from_categories(categories: &'a [Category]) -> Self {
        let total_tasks: u64 = categories.iter().map(|c| c.task_count).sum();
        let most_used = categories.iter().fold(None::<&Category>, |best, c| match best {
            Some(b) if b.task_count >= c.task_count => Some(b),
            _ => Some(c),
        });
        let average_tasks = if categories.is_empty() {
            0.0
        } else {
            total_tasks as f64 / categories.len() as f64
        };

        Self {
            categories: categories.len(),
            total_tasks,
            most_used,
            average_tasks,
        }
    }
}
