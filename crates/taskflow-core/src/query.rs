use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::debug;

use crate::filter::{FilterState, Predicate, StatusFilter};
use crate::task::{Category, CategoryId, Task, Workspace};

/// How the visible list is ordered once filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPolicy {
    /// Priority rank, then due date, then newest first.
    Dashboard,
    /// Store order, untouched.
    Insertion,
}

/// Dashboard ordering: priority rank descending; dated tasks before undated
/// ones, earlier due dates first; newest created first when neither task has
/// a due date. Anything else compares equal so a stable sort keeps input order.
pub fn dashboard_order(a: &Task, b: &Task) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        })
}

#[tracing::instrument(skip(tasks, predicate), fields(total = tasks.len()))]
pub fn visible_tasks<'a>(
    tasks: &'a [Task],
    predicate: &Predicate<'_>,
    policy: SortPolicy,
) -> Vec<&'a Task> {
    let mut rows: Vec<&Task> = tasks.iter().filter(|task| predicate.matches(task)).collect();

    if policy == SortPolicy::Dashboard {
        rows.sort_by(|a, b| dashboard_order(a, b));
    }

    debug!(visible = rows.len(), ?policy, "computed visible tasks");
    rows
}

/// Filters used by the dashboard: a status tab and at most one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub status: StatusFilter,
    pub category: Option<CategoryId>,
}

impl DashboardView {
    pub fn filter_state(&self) -> FilterState {
        FilterState {
            status: self.status,
            categories: self.category.into_iter().collect(),
            ..FilterState::default()
        }
    }
}

pub fn dashboard<'a>(ws: &'a Workspace, view: &DashboardView, today: NaiveDate) -> Vec<&'a Task> {
    let filter = view.filter_state();
    let predicate = Predicate::new("", &filter, &ws.categories, today);
    visible_tasks(&ws.tasks, &predicate, SortPolicy::Dashboard)
}

/// The dashboard's filters without its sort: tasks appear in store order,
/// so a manual reorder shows up here.
pub fn store_view<'a>(ws: &'a Workspace, view: &DashboardView, today: NaiveDate) -> Vec<&'a Task> {
    let filter = view.filter_state();
    let predicate = Predicate::new("", &filter, &ws.categories, today);
    visible_tasks(&ws.tasks, &predicate, SortPolicy::Insertion)
}

pub fn search<'a>(
    ws: &'a Workspace,
    query: &str,
    filter: &FilterState,
    today: NaiveDate,
) -> Vec<&'a Task> {
    let predicate = Predicate::new(query, filter, &ws.categories, today);
    visible_tasks(&ws.tasks, &predicate, SortPolicy::Insertion)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategorySort {
    #[default]
    Name,
    TaskCount,
    Recent,
}

impl FromStr for CategorySort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(CategorySort::Name),
            "count" | "taskcount" | "task-count" => Ok(CategorySort::TaskCount),
            "recent" | "lastused" | "last-used" => Ok(CategorySort::Recent),
            other => Err(anyhow!("invalid category sort: {other} (expected name, count or recent)")),
        }
    }
}

/// Case-insensitive name order with a case-sensitive tie-break, so "apple"
/// and "Apple" sit together but still order deterministically.
fn name_order(a: &Category, b: &Category) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

pub fn sort_categories<'a, I>(categories: I, sort: CategorySort) -> Vec<&'a Category>
where
    I: IntoIterator<Item = &'a Category>,
{
    let mut rows: Vec<&Category> = categories.into_iter().collect();
    match sort {
        CategorySort::Name => rows.sort_by(|a, b| name_order(a, b)),
        CategorySort::TaskCount => rows.sort_by(|a, b| b.task_count.cmp(&a.task_count)),
        CategorySort::Recent => rows.sort_by(|a, b| b.last_used.cmp(&a.last_used)),
    }
    rows
}

/// Category list view: name substring search, then the chosen order.
pub fn category_list<'a>(
    categories: &'a [Category],
    query: &str,
    sort: CategorySort,
) -> Vec<&'a Category> {
    let needle = query.to_lowercase();
    sort_categories(
        categories
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle)),
        sort,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{
        CategorySort, DashboardView, SortPolicy, category_list, dashboard, search, store_view,
        visible_tasks,
    };
    use crate::ops::reorder_visible;
    use crate::filter::{FilterState, Predicate, StatusFilter};
    use crate::task::{Category, Priority, Task, Workspace};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 16).unwrap()
    }

    fn task(id: u64, priority: Priority, due: Option<&str>, created_hour: u32) -> Task {
        let created = Utc.with_ymd_and_hms(2025, 7, 15, created_hour, 0, 0).unwrap();
        let mut t = Task::new(id, format!("task {id}"), created);
        t.priority = priority;
        t.due_date = due.map(|d| d.parse().unwrap());
        t
    }

    fn ids(rows: &[&Task]) -> Vec<u64> {
        rows.iter().map(|t| t.id).collect()
    }

    #[test]
    fn unconstrained_search_returns_whole_store_in_order() {
        let ws = Workspace {
            tasks: vec![
                task(3, Priority::Low, None, 1),
                task(1, Priority::High, Some("2025-07-20"), 2),
                task(2, Priority::Medium, None, 3),
            ],
            ..Workspace::default()
        };

        let rows = search(&ws, "", &FilterState::default(), today());
        assert_eq!(ids(&rows), vec![3, 1, 2]);
    }

    #[test]
    fn dashboard_sorts_by_priority_then_due_then_created() {
        let ws = Workspace {
            tasks: vec![
                task(1, Priority::Low, Some("2025-07-18"), 1),
                task(2, Priority::High, None, 2),
                task(3, Priority::High, Some("2025-07-20"), 3),
                task(4, Priority::High, Some("2025-07-17"), 4),
                task(5, Priority::Medium, None, 5),
                task(6, Priority::Medium, None, 9),
            ],
            ..Workspace::default()
        };

        let rows = dashboard(&ws, &DashboardView::default(), today());
        assert_eq!(ids(&rows), vec![4, 3, 2, 6, 5, 1]);
    }

    #[test]
    fn dashboard_sort_is_stable_for_equal_keys() {
        let ws = Workspace {
            tasks: vec![
                task(7, Priority::Medium, None, 5),
                task(3, Priority::Medium, None, 5),
                task(9, Priority::Medium, None, 5),
            ],
            ..Workspace::default()
        };

        let rows = dashboard(&ws, &DashboardView::default(), today());
        assert_eq!(ids(&rows), vec![7, 3, 9]);
    }

    #[test]
    fn store_view_shows_a_manual_reorder() {
        let mut ws = Workspace {
            tasks: vec![
                task(1, Priority::High, None, 1),
                task(2, Priority::Medium, None, 2),
                task(3, Priority::Low, None, 3),
            ],
            ..Workspace::default()
        };
        let view = DashboardView::default();
        let before = ids(&store_view(&ws, &view, today()));
        assert_eq!(before, vec![1, 2, 3]);

        ws.tasks = reorder_visible(&ws.tasks, &before, 0, 2).unwrap();
        assert_eq!(ids(&store_view(&ws, &view, today())), vec![2, 3, 1]);
        assert_eq!(ids(&dashboard(&ws, &view, today())), vec![1, 2, 3]);
    }

    #[test]
    fn store_view_keeps_filters() {
        let mut done = task(1, Priority::High, None, 1);
        done.completed = true;
        let ws = Workspace {
            tasks: vec![task(2, Priority::Low, None, 2), done, task(3, Priority::High, None, 3)],
            ..Workspace::default()
        };
        let active = DashboardView {
            status: StatusFilter::Active,
            category: None,
        };
        assert_eq!(ids(&store_view(&ws, &active, today())), vec![2, 3]);
    }

    #[test]
    fn dashboard_view_applies_status_and_category() {
        let mut done = task(1, Priority::High, None, 1);
        done.completed = true;
        done.category_id = Some(1);
        let mut open = task(2, Priority::Low, None, 2);
        open.category_id = Some(1);
        let mut other = task(3, Priority::Low, None, 3);
        other.category_id = Some(2);

        let ws = Workspace {
            tasks: vec![done, open, other],
            ..Workspace::default()
        };

        let active = DashboardView {
            status: StatusFilter::Active,
            category: Some(1),
        };
        assert_eq!(ids(&dashboard(&ws, &active, today())), vec![2]);

        let completed = DashboardView {
            status: StatusFilter::Completed,
            category: None,
        };
        assert_eq!(ids(&dashboard(&ws, &completed, today())), vec![1]);
    }

    #[test]
    fn overdue_filter_excludes_today_and_later() {
        let t = today();
        let mut yesterday = task(1, Priority::Low, None, 1);
        yesterday.due_date = Some(t - Duration::days(1));
        let mut on_today = task(2, Priority::Low, None, 1);
        on_today.due_date = Some(t);
        let mut later = task(3, Priority::Low, None, 1);
        later.due_date = Some(t + Duration::days(4));

        let tasks = vec![yesterday, on_today, later];
        let filter = FilterState {
            due_date: Some(crate::filter::DueBucket::Overdue),
            ..FilterState::default()
        };
        let pred = Predicate::new("", &filter, &[], t);
        let rows = visible_tasks(&tasks, &pred, SortPolicy::Insertion);
        assert_eq!(ids(&rows), vec![1]);
    }

    #[test]
    fn category_list_searches_and_sorts() {
        let base = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let mut work = Category::new(1, "Work Projects".into(), "#2563EB".into(), base);
        work.task_count = 12;
        let mut learning = Category::new(2, "learning".into(), "#7C3AED".into(), base);
        learning.task_count = 15;
        learning.last_used = base - Duration::days(5);
        let mut home = Category::new(3, "Home Maintenance".into(), "#DB2777".into(), base);
        home.task_count = 3;
        home.last_used = base + Duration::days(1);
        let cats = vec![work, learning, home];

        let by_name: Vec<u64> = category_list(&cats, "", CategorySort::Name)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(by_name, vec![3, 2, 1]);

        let by_count: Vec<u64> = category_list(&cats, "", CategorySort::TaskCount)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(by_count, vec![2, 1, 3]);

        let by_recent: Vec<u64> = category_list(&cats, "", CategorySort::Recent)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(by_recent, vec![3, 1, 2]);

        let searched: Vec<u64> = category_list(&cats, "PRO", CategorySort::Name)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(searched, vec![1]);
    }
}
