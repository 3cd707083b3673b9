use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use tracing::{info, instrument, warn};

use super::modifiers::resolve_category;
use super::{ScannedArgs, Session, parse_id, scan_args};
use crate::exchange::{
    category_file_name, export_category, export_file_name, export_workspace, import_document,
};
use crate::filter::{FilterState, StatusFilter};
use crate::query::{DashboardView, category_list, dashboard, search, store_view};
use crate::saved::{delete_saved_search, record_recent, save_search};
use crate::stats::{CategoryStats, Facets, TaskCounts};
use crate::task::{Task, Workspace};

/// Row order for `list`: the dashboard sort, or raw store order as `move`
/// addresses it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) enum ListOrder {
    #[default]
    Dashboard,
    Store,
}

impl FromStr for ListOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" | "priority" => Ok(ListOrder::Dashboard),
            "store" | "manual" => Ok(ListOrder::Store),
            other => Err(anyhow!("invalid list order: {other} (expected dashboard or store)")),
        }
    }
}

/// Reads the view selectors shared by `list` and `move`.
pub(super) fn parse_dashboard_view(ws: &Workspace, args: &[String]) -> anyhow::Result<DashboardView> {
    let (view, _) = parse_view(ws, args, &["category"])?;
    Ok(view)
}

fn parse_view(
    ws: &Workspace,
    args: &[String],
    value_opts: &[&str],
) -> anyhow::Result<(DashboardView, ScannedArgs)> {
    let scanned = scan_args(args, value_opts, &[])?;
    let status = match scanned.positional.as_slice() {
        [] => StatusFilter::All,
        [one] => one.parse()?,
        more => return Err(anyhow!("unexpected arguments: {}", more.join(" "))),
    };
    let category = scanned
        .last("category")
        .map(|token| resolve_category(&ws.categories, token))
        .transpose()?;
    Ok((DashboardView { status, category }, scanned))
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_list(session: &mut Session<'_>, ws: &Workspace, args: &[String]) -> anyhow::Result<()> {
    let (view, scanned) = parse_view(ws, args, &["category", "order"])?;
    let order = scanned
        .last("order")
        .map(str::parse::<ListOrder>)
        .transpose()?
        .unwrap_or_default();

    let rows = match order {
        ListOrder::Dashboard => dashboard(ws, &view, session.today),
        ListOrder::Store => store_view(ws, &view, session.today),
    };
    session.renderer.print_task_table(&rows, ws, session.today)?;
    print_footer(&TaskCounts::from_tasks(&ws.tasks))
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_search(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let scanned = scan_args(
        args,
        &["status", "priority", "category", "due", "save"],
        &[],
    )?;

    let mut filter = FilterState::default();
    if let Some(status) = scanned.last("status") {
        filter.status = status.parse()?;
    }
    for raw in scanned.values("priority") {
        for one in raw.split(',').filter(|s| !s.is_empty()) {
            filter.priority.insert(one.parse()?);
        }
    }
    for raw in scanned.values("category") {
        for one in raw.split(',').filter(|s| !s.is_empty()) {
            filter.categories.insert(resolve_category(&ws.categories, one)?);
        }
    }
    if let Some(due) = scanned.last("due") {
        filter.due_date = Some(due.parse()?);
    }

    let query = scanned.positional.join(" ");
    let limit = session.cfg.recent_limit()?;
    let mut next = Workspace {
        recent_searches: record_recent(&ws.recent_searches, &query, limit),
        ..ws.clone()
    };
    if let Some(name) = scanned.last("save") {
        if name.trim().is_empty() {
            return Err(anyhow!("a saved search needs a name"));
        }
        let (saved, id) =
            save_search(&next.saved_searches, name, &query, &filter, session.now);
        next.saved_searches = saved;
        println!("Saved search {id}.");
    }

    if next != ws {
        session.commit(next.clone())?;
    }
    show_search_results(session, &next, &query, &filter)
}

fn show_search_results(
    session: &mut Session<'_>,
    ws: &Workspace,
    query: &str,
    filter: &FilterState,
) -> anyhow::Result<()> {
    let rows = search(ws, query, filter, session.today);
    info!(
        results = rows.len(),
        filters = filter.active_filter_count(),
        active = filter.is_active(query),
        "search finished"
    );
    session.renderer.print_task_table(&rows, ws, session.today)?;
    let mut out = io::stdout().lock();
    writeln!(out, "{} of {} tasks", rows.len(), ws.tasks.len())?;
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_info(session: &mut Session<'_>, ws: &Workspace, args: &[String]) -> anyhow::Result<()> {
    let [token] = args else {
        return Err(anyhow!("info: exactly one task id is required"));
    };
    let id = parse_id(token)?;
    let task = ws
        .task(id)
        .ok_or_else(|| anyhow!("task {id} not found"))?;
    session.renderer.print_task_info(task, ws)
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_categories(
    session: &mut Session<'_>,
    ws: &Workspace,
    args: &[String],
) -> anyhow::Result<()> {
    let scanned = scan_args(args, &["sort"], &[])?;
    let sort = match scanned.last("sort") {
        Some(raw) => raw.parse()?,
        None => session.cfg.category_sort()?,
    };
    let query = scanned.positional.join(" ");
    let rows = category_list(&ws.categories, &query, sort);
    session.renderer.print_categories(&rows)
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_saved(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    match args {
        [] => session.renderer.print_saved_searches(&ws.saved_searches),
        [action, token] if action == "delete" => {
            let id = parse_id(token)?;
            if !ws.saved_searches.iter().any(|s| s.id == id) {
                return Err(anyhow!("saved search {id} not found"));
            }
            session.commit(Workspace {
                saved_searches: delete_saved_search(&ws.saved_searches, id),
                ..ws
            })?;
            println!("Deleted saved search {id}.");
            Ok(())
        }
        [action, token] if action == "load" => {
            let id = parse_id(token)?;
            let saved = ws
                .saved_searches
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| anyhow!("saved search {id} not found"))?;
            println!("{}", saved.name);
            show_search_results(session, &ws, &saved.query, &saved.filters)
        }
        _ => Err(anyhow!("usage: saved [delete ID | load ID]")),
    }
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_recent(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    match args {
        [] => session.renderer.print_recent(&ws.recent_searches),
        [action] if action == "clear" => {
            let cleared = ws.recent_searches.len();
            session.commit(Workspace {
                recent_searches: Vec::new(),
                ..ws
            })?;
            info!(cleared, "cleared recent searches");
            Ok(())
        }
        _ => Err(anyhow!("usage: recent [clear]")),
    }
}

#[instrument(skip(session, ws))]
pub(super) fn cmd_stats(session: &mut Session<'_>, ws: &Workspace) -> anyhow::Result<()> {
    let facets = Facets::from_tasks(&ws.tasks);
    let category_stats = CategoryStats::from_categories(&ws.categories);
    session.renderer.print_stats(&facets, &category_stats, ws)
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_export(session: &mut Session<'_>, ws: &Workspace, args: &[String]) -> anyhow::Result<()> {
    let scanned = scan_args(args, &["category", "output"], &[])?;
    if !scanned.positional.is_empty() {
        return Err(anyhow!(
            "unexpected arguments: {}",
            scanned.positional.join(" ")
        ));
    }
    let dir = PathBuf::from(scanned.last("output").unwrap_or("."));

    let (file_name, body) = match scanned.last("category") {
        Some(token) => {
            let id = resolve_category(&ws.categories, token)?;
            let name = ws.category_name(Some(id));
            (category_file_name(name), export_category(ws, id)?)
        }
        None => (export_file_name(session.now), export_workspace(ws, session.now)?),
    };

    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(file_name);
    fs::write(&path, body).with_context(|| format!("failed writing {}", path.display()))?;
    info!(file = %path.display(), "wrote export");
    println!("Exported to {}", path.display());
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_import(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [file] = args else {
        return Err(anyhow!("import: exactly one file is required"));
    };
    let raw = fs::read_to_string(file).with_context(|| format!("failed reading {file}"))?;

    let (next, summary) = match import_document(&ws, &raw, session.now) {
        Ok(done) => done,
        Err(err) => {
            warn!(error = ?err, file = %file, "import rejected");
            return Err(anyhow!("{err}"));
        }
    };

    session.commit(next)?;
    println!(
        "Imported {} categories and {} tasks.",
        summary.categories, summary.tasks
    );
    if summary.reassigned_ids > 0 {
        println!("{} colliding ids were reassigned.", summary.reassigned_ids);
    }
    Ok(())
}

fn print_footer(counts: &TaskCounts) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{} tasks, {} active, {} completed ({}%)",
        counts.total,
        counts.active,
        counts.completed,
        counts.completion_percent()
    )?;
    Ok(())
}

/// Task ids in display order, as `move` positions address them.
pub(super) fn visible_ids(rows: &[&Task]) -> Vec<u64> {
    rows.iter().map(|t| t.id).collect()
}

#[cfg(test)]
mod tests {
    use super::{ListOrder, parse_dashboard_view};
    use crate::filter::StatusFilter;
    use crate::task::Workspace;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn list_orders_parse() {
        assert_eq!("store".parse::<ListOrder>().unwrap(), ListOrder::Store);
        assert_eq!("Dashboard".parse::<ListOrder>().unwrap(), ListOrder::Dashboard);
        assert!("random".parse::<ListOrder>().is_err());
    }

    #[test]
    fn move_view_rejects_an_order_option() {
        let ws = Workspace::default();
        let view = parse_dashboard_view(&ws, &strings(&["active"])).unwrap();
        assert_eq!(view.status, StatusFilter::Active);
        assert!(parse_dashboard_view(&ws, &strings(&["--order", "store"])).is_err());
    }
}
