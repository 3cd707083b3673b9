use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::ops::refresh_task_counts;
use crate::task::{Category, Priority, Task, Workspace};
use crate::validate::TaskDraft;

const CATEGORIES: &[(u64, &str, &str)] = &[
    (1, "Work", "#3B82F6"),
    (2, "Personal", "#10B981"),
    (3, "Shopping", "#F59E0B"),
    (4, "Health", "#EF4444"),
    (5, "Learning", "#8B5CF6"),
];

struct SeedTask {
    id: u64,
    title: &'static str,
    description: &'static str,
    completed: bool,
    priority: Priority,
    category_id: u64,
    due: (i32, u32, u32),
    tags: [&'static str; 2],
    created: (u32, u32, u32, u32),
}

const TASKS: &[SeedTask] = &[
    SeedTask {
        id: 1,
        title: "Complete project proposal",
        description: "Finish the quarterly project proposal for the new client presentation. Include budget estimates, timeline, and resource allocation.",
        completed: false,
        priority: Priority::High,
        category_id: 1,
        due: (2025, 7, 17),
        tags: ["urgent", "client"],
        created: (15, 9, 0, 0),
    },
    SeedTask {
        id: 2,
        title: "Review team performance",
        description: "Conduct quarterly performance reviews for all team members and prepare feedback reports.",
        completed: true,
        priority: Priority::Medium,
        category_id: 1,
        due: (2025, 7, 16),
        tags: ["hr", "quarterly"],
        created: (14, 14, 30, 0),
    },
    SeedTask {
        id: 3,
        title: "Buy groceries",
        description: "Weekly grocery shopping: milk, bread, eggs, vegetables, and fruits for the family.",
        completed: false,
        priority: Priority::Low,
        category_id: 3,
        due: (2025, 7, 18),
        tags: ["weekly", "family"],
        created: (16, 8, 15, 0),
    },
    SeedTask {
        id: 4,
        title: "Schedule doctor appointment",
        description: "Book annual health checkup with Dr. Smith. Call the clinic and confirm available slots.",
        completed: false,
        priority: Priority::Medium,
        category_id: 4,
        due: (2025, 7, 20),
        tags: ["health", "annual"],
        created: (15, 16, 45, 0),
    },
    SeedTask {
        id: 5,
        title: "Learn React hooks",
        description: "Complete the advanced React hooks tutorial series and practice with useState, useEffect, and custom hooks.",
        completed: false,
        priority: Priority::Medium,
        category_id: 5,
        due: (2025, 7, 25),
        tags: ["programming", "react"],
        created: (13, 11, 20, 0),
    },
    SeedTask {
        id: 6,
        title: "Plan weekend trip",
        description: "Research and plan a weekend getaway. Book accommodation, check weather, and create itinerary.",
        completed: false,
        priority: Priority::Low,
        category_id: 2,
        due: (2025, 7, 22),
        tags: ["travel", "weekend"],
        created: (16, 10, 0, 0),
    },
    SeedTask {
        id: 7,
        title: "Update resume",
        description: "Revise and update professional resume with recent projects and achievements.",
        completed: true,
        priority: Priority::Medium,
        category_id: 1,
        due: (2025, 7, 15),
        tags: ["career", "professional"],
        created: (12, 13, 30, 0),
    },
    SeedTask {
        id: 8,
        title: "Exercise routine",
        description: "Complete 30-minute workout session including cardio and strength training exercises.",
        completed: false,
        priority: Priority::High,
        category_id: 4,
        due: (2025, 7, 16),
        tags: ["fitness", "daily"],
        created: (16, 6, 0, 0),
    },
    SeedTask {
        id: 9,
        title: "Read chapter 5",
        description: "Read and take notes on chapter 5 of 'Clean Code' book. Focus on functions and error handling.",
        completed: false,
        priority: Priority::Low,
        category_id: 5,
        due: (2025, 7, 19),
        tags: ["reading", "programming"],
        created: (14, 19, 15, 0),
    },
    SeedTask {
        id: 10,
        title: "Call mom",
        description: "Weekly check-in call with mom to catch up on family news and see how she's doing.",
        completed: true,
        priority: Priority::Medium,
        category_id: 2,
        due: (2025, 7, 16),
        tags: ["family", "weekly"],
        created: (16, 9, 30, 0),
    },
];

/// Canned starting points for `add --template`.
pub struct TaskTemplate {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub priority: Priority,
    pub category: &'static str,
    pub tags: &'static [&'static str],
}

pub const TEMPLATES: &[TaskTemplate] = &[
    TaskTemplate {
        name: "meeting",
        title: "Team Meeting",
        description: "Discuss project progress and next steps",
        priority: Priority::Medium,
        category: "Work",
        tags: &["meeting", "team"],
    },
    TaskTemplate {
        name: "deadline",
        title: "Project Deadline",
        description: "Complete and submit project deliverables",
        priority: Priority::High,
        category: "Work",
        tags: &["deadline", "urgent"],
    },
    TaskTemplate {
        name: "personal",
        title: "Personal Task",
        description: "Personal activity or goal",
        priority: Priority::Medium,
        category: "Personal",
        tags: &["personal"],
    },
    TaskTemplate {
        name: "health",
        title: "Health & Fitness",
        description: "Exercise or health-related activity",
        priority: Priority::Medium,
        category: "Health",
        tags: &["health", "exercise"],
    },
];

pub fn find_template(name: &str) -> Option<&'static TaskTemplate> {
    TEMPLATES.iter().find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

impl TaskTemplate {
    /// A draft prefilled from the template. The category is matched by name
    /// and left unset when the workspace has no such category.
    pub fn draft(&self, categories: &[Category]) -> TaskDraft {
        TaskDraft {
            title: self.title.to_string(),
            description: self.description.to_string(),
            priority: self.priority,
            category_id: categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(self.category))
                .map(|c| c.id),
            due_date: None,
            tags: self.tags.iter().map(|t| (*t).to_string()).collect(),
            completed: false,
        }
    }
}

/// The starter workspace written on first run: five categories and ten tasks
/// from mid-July 2025. Category task counts are derived from the tasks.
pub fn seed_workspace(now: DateTime<Utc>) -> Workspace {
    let tasks: Vec<Task> = TASKS.iter().map(|row| seed_task(row, now)).collect();
    let categories: Vec<Category> = CATEGORIES
        .iter()
        .map(|(id, name, color)| Category::new(*id, (*name).to_string(), (*color).to_string(), now))
        .collect();

    Workspace {
        categories: refresh_task_counts(&categories, &tasks),
        tasks,
        ..Workspace::default()
    }
}

fn seed_task(row: &SeedTask, now: DateTime<Utc>) -> Task {
    let (year, month, day) = row.due;
    let (created_day, hour, minute, second) = row.created;
    let created_at = Utc
        .with_ymd_and_hms(2025, 7, created_day, hour, minute, second)
        .single()
        .unwrap_or(now);

    Task {
        id: row.id,
        title: row.title.to_string(),
        description: Some(row.description.to_string()),
        completed: row.completed,
        priority: row.priority,
        category_id: Some(row.category_id),
        due_date: NaiveDate::from_ymd_opt(year, month, day),
        tags: row.tags.iter().map(|t| (*t).to_string()).collect(),
        created_at,
        updated_at: None,
    }
}
