use std::sync::OnceLock;

use anyhow::anyhow;
use regex::Regex;
use tracing::{info, instrument};

use super::modifiers::resolve_category;
use super::{Session, parse_index, scan_args};
use crate::ops::{
    complete_category, create_category, delete_category, merge_categories, recolor_category,
    remove_categories, rename_category, reorder_raw,
};
use crate::task::{CategoryId, Workspace};

/// Colors handed to new categories created without one, in turn.
const PALETTE: [&str; 8] = [
    "#2563EB", "#DC2626", "#059669", "#D97706", "#7C3AED", "#DB2777", "#0891B2", "#65A30D",
];

#[instrument(skip(session, ws, args))]
pub(super) fn cmd_category(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let Some((action, rest)) = args.split_first() else {
        return Err(anyhow!(
            "category: expected add, rename, color, delete, merge, move, complete or archive"
        ));
    };

    match action.as_str() {
        "add" => category_add(session, ws, rest),
        "rename" => category_rename(session, ws, rest),
        "color" => category_color(session, ws, rest),
        "delete" => category_delete(session, ws, rest),
        "merge" => category_merge(session, ws, rest),
        "move" => category_move(session, ws, rest),
        "complete" => category_complete(session, ws, rest),
        "archive" => category_archive(session, ws, rest),
        other => Err(anyhow!("unknown category action: {other}")),
    }
}

fn category_add(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let (name, color) = match args {
        [] => return Err(anyhow!("category add: a name is required")),
        [words @ .., last] if is_hex_color(last) && !words.is_empty() => {
            (words.join(" "), last.clone())
        }
        words => (
            words.join(" "),
            PALETTE[ws.categories.len() % PALETTE.len()].to_string(),
        ),
    };
    if name.trim().is_empty() {
        return Err(anyhow!("category add: a name is required"));
    }

    let (categories, id) = create_category(&ws.categories, &name, &color, session.now);
    session.commit(Workspace { categories, ..ws })?;
    println!("Created category {id} ({}).", name.trim());
    Ok(())
}

fn category_rename(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [token, words @ ..] = args else {
        return Err(anyhow!("category rename: ID NAME required"));
    };
    let name = words.join(" ");
    if name.trim().is_empty() {
        return Err(anyhow!("category rename: a new name is required"));
    }
    let id = resolve_category(&ws.categories, token)?;
    let categories = rename_category(&ws.categories, id, &name)?;
    session.commit(Workspace { categories, ..ws })?;
    println!("Renamed category {id}.");
    Ok(())
}

fn category_color(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [token, color] = args else {
        return Err(anyhow!("category color: ID COLOR required"));
    };
    if !is_hex_color(color) {
        return Err(anyhow!("invalid color: {color} (expected #RRGGBB)"));
    }
    let id = resolve_category(&ws.categories, token)?;
    let categories = recolor_category(&ws.categories, id, color)?;
    session.commit(Workspace { categories, ..ws })?;
    println!("Recolored category {id}.");
    Ok(())
}

fn category_delete(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let scanned = scan_args(args, &[], &["yes"])?;
    let [token] = scanned.positional.as_slice() else {
        return Err(anyhow!("category delete: exactly one ID is required"));
    };
    let id = resolve_category(&ws.categories, token)?;
    let policy = session.cfg.orphan_policy()?;

    let name = ws.category_name(Some(id)).to_string();
    if !session.confirm(scanned.flag("yes"), &format!("Delete category {name}?"))? {
        info!("category delete declined");
        return Ok(());
    }

    let next = delete_category(&ws, id, policy)?;
    session.commit(next)?;
    println!("Deleted category {name}.");
    Ok(())
}

fn category_merge(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [target, sources @ ..] = args else {
        return Err(anyhow!("category merge: TARGET SRC.. required"));
    };
    if sources.is_empty() {
        return Err(anyhow!("category merge: at least one source is required"));
    }

    let target = resolve_category(&ws.categories, target)?;
    let sources = resolve_many(&ws, sources)?;
    let next = merge_categories(&ws, &sources, target)?;
    session.commit(next)?;
    println!("Merged {} category(s) into {target}.", sources.len());
    Ok(())
}

fn category_move(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [from, to] = args else {
        return Err(anyhow!("category move: FROM TO positions required"));
    };
    let categories = reorder_raw(&ws.categories, parse_index(from)?, parse_index(to)?)?;
    session.commit(Workspace { categories, ..ws })?;
    println!("Moved category from position {from} to {to}.");
    Ok(())
}

fn category_complete(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let [token] = args else {
        return Err(anyhow!("category complete: exactly one ID is required"));
    };
    let id = resolve_category(&ws.categories, token)?;
    let tasks = complete_category(&ws.tasks, id);
    session.commit(Workspace { tasks, ..ws })?;
    println!("Completed every task in {}.", token);
    Ok(())
}

fn category_archive(session: &mut Session<'_>, ws: Workspace, args: &[String]) -> anyhow::Result<()> {
    let scanned = scan_args(args, &[], &["yes"])?;
    if scanned.positional.is_empty() {
        return Err(anyhow!("category archive: at least one ID is required"));
    }
    let ids = resolve_many(&ws, &scanned.positional)?;
    let policy = session.cfg.orphan_policy()?;

    if !session.confirm(
        scanned.flag("yes"),
        &format!("Archive {} category(s)?", ids.len()),
    )? {
        info!("category archive declined");
        return Ok(());
    }

    let next = remove_categories(&ws, &ids, policy);
    session.commit(next)?;
    println!("Archived {} category(s).", ids.len());
    Ok(())
}

fn resolve_many(ws: &Workspace, tokens: &[String]) -> anyhow::Result<Vec<CategoryId>> {
    let mut ids = Vec::with_capacity(tokens.len());
    for token in tokens {
        let id = resolve_category(&ws.categories, token)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn is_hex_color(raw: &str) -> bool {
    static HEX_RE: OnceLock<Option<Regex>> = OnceLock::new();
    HEX_RE
        .get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(raw))
}

#[cfg(test)]
mod tests {
    use super::is_hex_color;

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#3B82F6"));
        assert!(is_hex_color("#a1b2c3"));
        assert!(!is_hex_color("3B82F6"));
        assert!(!is_hex_color("#FFF"));
        assert!(!is_hex_color("blue"));
    }
}
