use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::datetime::format_iso_timestamp;
use crate::ops::next_id;
use crate::task::{Category, CategoryId, Priority, Task, TaskId, Workspace};

const DEFAULT_IMPORT_COLOR: &str = "#6B7280";

/// Every import failure reads the same to the user.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid file format")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid file format")]
    MissingSection(&'static str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    categories: &'a [Category],
    tasks: &'a [Task],
    export_date: String,
}

#[derive(Debug, Serialize)]
struct CategoryExport<'a> {
    category: &'a Category,
    tasks: Vec<&'a Task>,
}

/// Serializes all categories and tasks with an export timestamp.
#[tracing::instrument(skip(ws, now))]
pub fn export_workspace(ws: &Workspace, now: DateTime<Utc>) -> anyhow::Result<String> {
    let doc = ExportDocument {
        categories: &ws.categories,
        tasks: &ws.tasks,
        export_date: format_iso_timestamp(now),
    };
    let out = serde_json::to_string_pretty(&doc)?;
    info!(
        categories = ws.categories.len(),
        tasks = ws.tasks.len(),
        "exported workspace"
    );
    Ok(out)
}

/// `taskflow-categories-<YYYY-MM-DD>.json`, dated in UTC.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("taskflow-categories-{}.json", now.format("%Y-%m-%d"))
}

#[tracing::instrument(skip(ws))]
pub fn export_category(ws: &Workspace, id: CategoryId) -> anyhow::Result<String> {
    let category = ws
        .category(id)
        .ok_or_else(|| anyhow!("category {id} not found"))?;
    let doc = CategoryExport {
        category,
        tasks: ws
            .tasks
            .iter()
            .filter(|t| t.category_id == Some(id))
            .collect(),
    };
    info!(id, tasks = doc.tasks.len(), "exported category");
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// `<slug>-tasks.json`: the category name lowercased with each whitespace run
/// replaced by `-`.
pub fn category_file_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.push(ch);
            in_space = false;
        }
    }
    format!("{slug}-tasks.json")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportCategory {
    #[serde(default)]
    id: Option<CategoryId>,
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    task_count: Option<u64>,
    #[serde(default)]
    last_used: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportTask {
    #[serde(default)]
    id: Option<TaskId>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    category_id: Option<CategoryId>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub tasks: usize,
    /// Records whose id collided with an existing one and was replaced.
    pub reassigned_ids: usize,
}

/// Appends the categories and tasks of an exported document to `ws`.
///
/// The document must carry top-level `categories` and `tasks` arrays. Records
/// are appended in file order without deduplication; ids that collide with
/// existing ones are reallocated, and imported tasks follow their category to
/// its new id. On error `ws` is left as it was.
#[tracing::instrument(skip(ws, raw, now))]
pub fn import_document(
    ws: &Workspace,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<(Workspace, ImportSummary), ImportError> {
    let doc: Value = serde_json::from_str(raw).map_err(ImportError::Malformed)?;
    let categories = section(&doc, "categories")?;
    let tasks = section(&doc, "tasks")?;

    let categories: Vec<ImportCategory> = categories
        .iter()
        .cloned()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .map_err(ImportError::Malformed)?;
    let tasks: Vec<ImportTask> = tasks
        .iter()
        .cloned()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .map_err(ImportError::Malformed)?;

    let mut out = ws.clone();
    let mut summary = ImportSummary::default();

    let mut used_category_ids: BTreeSet<CategoryId> = out.categories.iter().map(|c| c.id).collect();
    let mut category_remap: BTreeMap<CategoryId, CategoryId> = BTreeMap::new();
    for row in categories {
        let id = claim_id(row.id, &mut used_category_ids, now, &mut summary.reassigned_ids);
        if let Some(old) = row.id
            && old != id
        {
            category_remap.insert(old, id);
        }
        out.categories.push(normalize_import_category(row, id, now));
        summary.categories += 1;
    }

    let mut used_task_ids: BTreeSet<TaskId> = out.tasks.iter().map(|t| t.id).collect();
    for row in tasks {
        let id = claim_id(row.id, &mut used_task_ids, now, &mut summary.reassigned_ids);
        let mut task = normalize_import_task(row, id, now);
        if let Some(new_id) = task.category_id.and_then(|old| category_remap.get(&old)) {
            task.category_id = Some(*new_id);
        }
        out.tasks.push(task);
        summary.tasks += 1;
    }

    info!(
        categories = summary.categories,
        tasks = summary.tasks,
        reassigned = summary.reassigned_ids,
        "imported document"
    );
    Ok((out, summary))
}

fn section<'a>(doc: &'a Value, key: &'static str) -> Result<&'a Vec<Value>, ImportError> {
    doc.get(key)
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingSection(key))
}

fn claim_id(
    wanted: Option<u64>,
    used: &mut BTreeSet<u64>,
    now: DateTime<Utc>,
    reassigned: &mut usize,
) -> u64 {
    let id = match wanted {
        Some(id) if !used.contains(&id) => id,
        Some(id) => {
            *reassigned += 1;
            let fresh = next_id(used.iter().copied(), now);
            debug!(old = id, new = fresh, "reassigned colliding id");
            fresh
        }
        None => next_id(used.iter().copied(), now),
    };
    used.insert(id);
    id
}

fn normalize_import_category(row: ImportCategory, id: CategoryId, now: DateTime<Utc>) -> Category {
    Category {
        id,
        name: row.name,
        color: row.color.unwrap_or_else(|| DEFAULT_IMPORT_COLOR.to_string()),
        task_count: row.task_count.unwrap_or(0),
        last_used: parse_timestamp(row.last_used.as_deref(), "lastUsed").unwrap_or(now),
    }
}

fn normalize_import_task(row: ImportTask, id: TaskId, now: DateTime<Utc>) -> Task {
    let priority = match row.priority.as_deref().map(str::parse::<Priority>) {
        Some(Ok(priority)) => priority,
        Some(Err(err)) => {
            warn!(id, error = %err, "unknown priority on import; using medium");
            Priority::default()
        }
        None => Priority::default(),
    };

    Task {
        id,
        title: row.title,
        description: row.description,
        completed: row.completed,
        priority,
        category_id: row.category_id,
        due_date: row.due_date.as_deref().and_then(parse_import_date),
        tags: row.tags,
        created_at: parse_timestamp(row.created_at.as_deref(), "createdAt").unwrap_or(now),
        updated_at: parse_timestamp(row.updated_at.as_deref(), "updatedAt"),
    }
}

/// Accepts `YYYY-MM-DD` or a full timestamp whose first ten characters are
/// one.
fn parse_import_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            warn!(value = raw, error = %err, "unparseable due date on import; dropping it");
            None
        }
    }
}

fn parse_timestamp(raw: Option<&str>, field: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(err) => {
            warn!(field, value = raw, error = %err, "unparseable timestamp on import");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        ImportError, category_file_name, export_category, export_file_name, export_workspace,
        import_document,
    };
    use crate::task::{Category, Priority, Task, Workspace};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn sample() -> Workspace {
        let mut task = Task::new(7, "X".to_string(), now());
        task.category_id = Some(1);
        task.priority = Priority::Low;
        Workspace {
            categories: vec![Category::new(1, "Work".into(), "#2563EB".into(), now())],
            tasks: vec![task],
            ..Workspace::default()
        }
    }

    #[test]
    fn export_has_top_level_sections_and_date() {
        let raw = export_workspace(&sample(), now()).expect("export");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["exportDate"], "2025-01-01T00:00:00.000Z");
        assert_eq!(value["categories"][0]["name"], "Work");
        assert_eq!(value["tasks"][0]["categoryId"], 1);
        assert_eq!(export_file_name(now()), "taskflow-categories-2025-01-01.json");
    }

    #[test]
    fn category_export_keeps_only_its_tasks() {
        let mut ws = sample();
        let mut other = Task::new(8, "Y".to_string(), now());
        other.category_id = Some(2);
        ws.tasks.push(other);

        let raw = export_category(&ws, 1).expect("export");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["category"]["id"], 1);
        assert_eq!(value["tasks"].as_array().map(Vec::len), Some(1));
        assert!(export_category(&ws, 99).is_err());
    }

    #[test]
    fn slug_collapses_whitespace_runs() {
        assert_eq!(category_file_name("Health & Fitness"), "health-&-fitness-tasks.json");
        assert_eq!(category_file_name("Work   Projects"), "work-projects-tasks.json");
    }

    #[test]
    fn imports_browser_shaped_document() {
        let raw = r##"{
            "categories": [{"id": 1, "name": "Work", "color": "#2563EB"}],
            "tasks": [{"id": 7, "title": "X", "categoryId": 1, "completed": false, "priority": "low"}],
            "exportDate": "2025-01-01T00:00:00.000Z"
        }"##;

        let (ws, summary) = import_document(&Workspace::default(), raw, now()).expect("import");
        assert_eq!(summary.tasks, 1);
        assert_eq!(summary.categories, 1);
        assert_eq!(summary.reassigned_ids, 0);
        let task = &ws.tasks[0];
        assert_eq!(task.title, "X");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(ws.category_name(task.category_id), "Work");
        assert_eq!(task.created_at, now());
    }

    #[test]
    fn colliding_ids_are_reallocated_and_followed() {
        let ws = sample();
        let raw = export_workspace(&ws, now()).expect("export");

        let (merged, summary) = import_document(&ws, &raw, now()).expect("import");
        assert_eq!(merged.tasks.len(), 2);
        assert_eq!(merged.categories.len(), 2);
        assert_eq!(summary.reassigned_ids, 2);

        let copy = &merged.tasks[1];
        assert_ne!(copy.id, 7);
        assert_ne!(copy.category_id, Some(1));
        assert_eq!(merged.category_name(copy.category_id), "Work");
    }

    #[test]
    fn rejects_bad_documents_without_touching_the_store() {
        let ws = sample();
        for raw in ["not json", r#"{"tasks": []}"#, r#"{"categories": [], "tasks": {}}"#] {
            let err = import_document(&ws, raw, now()).unwrap_err();
            assert_eq!(err.to_string(), "Invalid file format");
        }
        assert!(matches!(
            import_document(&ws, r#"{"categories": []}"#, now()),
            Err(ImportError::MissingSection("tasks"))
        ));
    }
}
