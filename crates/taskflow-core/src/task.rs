use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_timestamp_serde;
use crate::saved::SavedSearch;

pub type TaskId = u64;
pub type CategoryId = u64;

/// Label shown for a task whose category is unset or no longer exists.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Dashboard rank: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(anyhow!("invalid priority: {other} (expected high, medium or low)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub category_id: Option<CategoryId>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(with = "iso_timestamp_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "iso_timestamp_serde::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: None,
            completed: false,
            priority: Priority::default(),
            category_id: None,
            due_date: None,
            tags: vec![],
            created_at: now,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: String,

    #[serde(default)]
    pub task_count: u64,

    #[serde(with = "iso_timestamp_serde")]
    pub last_used: DateTime<Utc>,
}

impl Category {
    pub fn new(id: CategoryId, name: String, color: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            color,
            task_count: 0,
            last_used: now,
        }
    }
}

/// The record store: one ordered task list, one ordered category list, and
/// the search history that travels with them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub saved_searches: Vec<SavedSearch>,

    #[serde(default)]
    pub recent_searches: Vec<String>,
}

impl Workspace {
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Display name for a task's category; dangling and unset references
    /// both resolve to [`UNCATEGORIZED`].
    pub fn category_name(&self, id: Option<CategoryId>) -> &str {
        id.and_then(|id| self.category(id))
            .map(|c| c.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Category, Priority, Task, UNCATEGORIZED, Workspace};

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().expect("parse"), Priority::High);
        assert_eq!("l".parse::<Priority>().expect("parse"), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn task_json_uses_camel_case_fields() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 9, 0, 0).unwrap();
        let mut task = Task::new(1, "Complete project proposal".to_string(), now);
        task.category_id = Some(1);
        task.due_date = chrono::NaiveDate::from_ymd_opt(2025, 7, 17);

        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["categoryId"], 1);
        assert_eq!(json["dueDate"], "2025-07-17");
        assert_eq!(json["createdAt"], "2025-07-15T09:00:00.000Z");
        assert_eq!(json["priority"], "medium");

        let back: Task = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, task);
    }

    #[test]
    fn dangling_category_reads_as_uncategorized() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 9, 0, 0).unwrap();
        let ws = Workspace {
            categories: vec![Category::new(1, "Work".to_string(), "#3B82F6".to_string(), now)],
            ..Workspace::default()
        };

        assert_eq!(ws.category_name(Some(1)), "Work");
        assert_eq!(ws.category_name(Some(99)), UNCATEGORIZED);
        assert_eq!(ws.category_name(None), UNCATEGORIZED);
    }
}
