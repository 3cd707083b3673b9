use anyhow::anyhow;
use tracing::{info, instrument};

use super::modifiers::{apply_mods, parse_title_and_mods};
use super::views::{parse_dashboard_view, visible_ids};
use super::{Session, parse_id, parse_index, parse_task_ids, scan_args};
use crate::ops::{
    bulk_set_completed, create_task, delete_tasks, reorder_visible, set_completed,
    toggle_completed, update_task,
};
use crate::query::store_view;
use crate::seed::{TEMPLATES, find_template};
use crate::task::{CategoryId, Workspace};
use crate::validate::{TaskDraft, validate_draft, validate_edit};

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_add(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let (template, args) = take_template(args)?;
    let (title, mods) = parse_title_and_mods(&args, session.today)?;
    let mut draft = match template {
        Some(name) => find_template(&name)
            .ok_or_else(|| {
                let names: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
                anyhow!("unknown template: {name} (expected one of {})", names.join(", "))
            })?
            .draft(&ws.categories),
        None => TaskDraft::default(),
    };
    if !title.is_empty() {
        draft.title = title;
    }
    apply_mods(&mut draft, &mods, &ws.categories)?;
    validate_draft(&draft, session.today, session.cfg.limits()?)?;

    let (tasks, id) = create_task(&ws.tasks, &draft, session.now);
    let next = touch_category(Workspace { tasks, ..ws }, draft.category_id, session);
    session.commit(next)?;
    println!("Created task {id}.");
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_modify(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let Some((first, rest)) = args.split_first() else {
        return Err(anyhow!("modify: a task id is required"));
    };
    let id = parse_id(first)?;
    let task = ws
        .task(id)
        .ok_or_else(|| anyhow!("task {id} not found"))?;

    let (title, mods) = parse_title_and_mods(rest, session.today)?;
    if title.is_empty() && mods.is_empty() {
        return Err(anyhow!("modify: nothing to change"));
    }

    let mut draft = TaskDraft::from_task(task);
    if !title.is_empty() {
        draft.title = title;
    }
    apply_mods(&mut draft, &mods, &ws.categories)?;
    validate_edit(&draft, task, session.today, session.cfg.limits()?)?;

    let tasks = update_task(&ws.tasks, id, &draft, session.now)?;
    let next = touch_category(Workspace { tasks, ..ws }, draft.category_id, session);
    session.commit(next)?;
    println!("Modified task {id}.");
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_set_completed(
    session: &mut Session<'_>,
    ws: Workspace,
    args: &[String],
    completed: bool,
) -> anyhow::Result<()> {
    let ids = parse_task_ids(&ws, args)?;
    let tasks = match ids.as_slice() {
        [one] => set_completed(&ws.tasks, *one, completed),
        many => bulk_set_completed(&ws.tasks, many, completed),
    };
    session.commit(Workspace { tasks, ..ws })?;

    let verb = if completed { "Completed" } else { "Reopened" };
    println!("{verb} {} task(s).", ids.len());
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_toggle(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [token] = args else {
        return Err(anyhow!("toggle: exactly one task id is required"));
    };
    let id = parse_id(token)?;
    let tasks = toggle_completed(&ws.tasks, id)?;
    let completed = tasks.iter().any(|t| t.id == id && t.completed);
    session.commit(Workspace { tasks, ..ws })?;
    println!(
        "Task {id} is now {}.",
        if completed { "completed" } else { "active" }
    );
    Ok(())
}

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_delete(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let scanned = scan_args(args, &[], &["yes"])?;
    let ids = parse_task_ids(&ws, &scanned.positional)?;

    let prompt = match ids.as_slice() {
        [one] => format!(
            "Delete task {one} ({})?",
            ws.task(*one).map(|t| t.title.as_str()).unwrap_or_default()
        ),
        many => format!("Delete {} tasks?", many.len()),
    };
    if !session.confirm(scanned.flag("yes"), &prompt)? {
        info!("delete declined");
        return Ok(());
    }

    let tasks = delete_tasks(&ws.tasks, &ids);
    session.commit(Workspace { tasks, ..ws })?;
    println!("Deleted {} task(s).", ids.len());
    Ok(())
}

/// Moves a task between two positions of the store-ordered list, as shown by
/// `list --order store` with the same view arguments.
#[instrument(skip(session, ws, args))]
pub(super) fn cmd_move(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [from, to, view_args @ ..] = args else {
        return Err(anyhow!("move: <from> <to> positions are required"));
    };
    let from = parse_index(from)?;
    let to = parse_index(to)?;

    let view = parse_dashboard_view(&ws, view_args)?;
    let visible = visible_ids(&store_view(&ws, &view, session.today));
    let tasks = reorder_visible(&ws.tasks, &visible, from, to)?;
    session.commit(Workspace { tasks, ..ws })?;
    println!("Moved task from position {from} to {to}.");
    Ok(())
}

/// Pulls `--template NAME` (or `--template=NAME`) out of `add` arguments.
/// Nothing after `--` is inspected.
fn take_template(args: &[String]) -> anyhow::Result<(Option<String>, Vec<String>)> {
    let mut template = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            rest.push(arg.clone());
            rest.extend(iter.by_ref().cloned());
            break;
        }
        if arg == "--template" {
            let name = iter
                .next()
                .ok_or_else(|| anyhow!("--template requires a value"))?;
            template = Some(name.clone());
        } else if let Some(name) = arg.strip_prefix("--template=") {
            template = Some(name.to_string());
        } else {
            rest.push(arg.clone());
        }
    }

    Ok((template, rest))
}

/// Stamps `last_used` on the category a task was just filed under.
fn touch_category(ws: Workspace, category_id: Option<CategoryId>, session: &Session<'_>) -> Workspace {
    let Some(id) = category_id else {
        return ws;
    };
    let categories = ws
        .categories
        .into_iter()
        .map(|mut c| {
            if c.id == id {
                c.last_used = session.now;
            }
            c
        })
        .collect();
    Workspace { categories, ..ws }
}
