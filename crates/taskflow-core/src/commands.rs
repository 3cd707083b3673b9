mod category_ops;
mod modifiers;
mod task_ops;
mod views;

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::to_project_date;
use crate::ops::refresh_task_counts;
use crate::render::Renderer;
use crate::task::{TaskId, Workspace};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list",
        "search",
        "add",
        "modify",
        "info",
        "done",
        "reopen",
        "toggle",
        "delete",
        "move",
        "categories",
        "category",
        "saved",
        "recent",
        "stats",
        "export",
        "import",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command handler needs besides its arguments.
pub(crate) struct Session<'a> {
    pub store: &'a DataStore,
    pub cfg: &'a Config,
    pub renderer: &'a mut Renderer,
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl Session<'_> {
    /// Recomputes category task counts and writes the workspace.
    pub fn commit(&self, ws: Workspace) -> anyhow::Result<Workspace> {
        let ws = Workspace {
            categories: refresh_task_counts(&ws.categories, &ws.tasks),
            ..ws
        };
        self.store.save(&ws)?;
        Ok(ws)
    }

    /// Asks before a destructive change unless `--yes` was given or
    /// `confirmation=off`.
    pub fn confirm(&self, assume_yes: bool, prompt: &str) -> anyhow::Result<bool> {
        if assume_yes || !self.cfg.confirmation() {
            debug!(assume_yes, "confirmation skipped");
            return Ok(true);
        }

        let mut out = io::stdout().lock();
        write!(out, "{prompt} [y/N] ")?;
        out.flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("failed reading confirmation")?;
        let accepted = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        if !accepted {
            writeln!(out, "Cancelled.")?;
        }
        Ok(accepted)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.args.as_slice();
    debug!(command, args = ?args, "dispatching command");

    match command {
        "help" => return cmd_help(),
        "version" => return cmd_version(),
        _ => {}
    }

    let now = Utc::now();
    let mut session = Session {
        store,
        cfg,
        renderer,
        now,
        today: to_project_date(now),
    };
    let ws = session.store.load(cfg.seed(), now)?;

    match command {
        "list" => views::cmd_list(&mut session, &ws, args),
        "search" => views::cmd_search(&mut session, ws, args),
        "add" => task_ops::cmd_add(&mut session, ws, args),
        "modify" => task_ops::cmd_modify(&mut session, ws, args),
        "info" => views::cmd_info(&mut session, &ws, args),
        "done" => task_ops::cmd_set_completed(&mut session, ws, args, true),
        "reopen" => task_ops::cmd_set_completed(&mut session, ws, args, false),
        "toggle" => task_ops::cmd_toggle(&mut session, ws, args),
        "delete" => task_ops::cmd_delete(&mut session, ws, args),
        "move" => task_ops::cmd_move(&mut session, ws, args),
        "categories" => views::cmd_categories(&mut session, &ws, args),
        "category" => category_ops::cmd_category(&mut session, ws, args),
        "saved" => views::cmd_saved(&mut session, ws, args),
        "recent" => views::cmd_recent(&mut session, ws, args),
        "stats" => views::cmd_stats(&mut session, &ws),
        "export" => views::cmd_export(&mut session, &ws, args),
        "import" => views::cmd_import(&mut session, ws, args),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_help() -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{HELP}")?;
    Ok(())
}

fn cmd_version() -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "taskflow {}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

const HELP: &str = "\
usage: taskflow [-v..] [-q..] [--taskflowrc PATH] [--data DIR] [--rc K=V].. <command> [args..]

  list [all|active|completed] [--category C] [--order dashboard|store]
  search [--status S] [--priority P].. [--category C].. [--due BUCKET] [--save NAME] [query..]
  add [--template meeting|deadline|personal|health] <title..> [pri:P] [cat:C] [due:EXPR] [+tag] [desc:TEXT]
  modify <id> [title..] [mods..]
  info <id>
  done <id>.. | reopen <id>.. | toggle <id>
  delete <id>.. [--yes]
  move <from> <to> [all|active|completed] [--category C]    positions as in list --order store
  categories [--sort name|count|recent] [query]
  category add NAME [COLOR] | rename ID NAME | color ID COLOR | delete ID [--yes]
           merge TARGET SRC.. | move FROM TO | complete ID | archive ID.. [--yes]
  saved [delete ID | load ID]
  recent [clear]
  stats
  export [--category C] [--output DIR]
  import <file>

Search operators: category:NAME, priority:LEVEL, due:today|tomorrow|none
Due buckets: today, tomorrow, this-week, next-week, overdue, no-due-date";

/// Options and flags split out of a command's arguments.
#[derive(Debug, Default)]
pub(crate) struct ScannedArgs {
    pub positional: Vec<String>,
    pub options: Vec<(String, String)>,
    pub flags: BTreeSet<String>,
}

impl ScannedArgs {
    pub fn values(&self, name: &str) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn last(&self, name: &str) -> Option<&str> {
        self.values(name).last()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }
}

/// Separates `--name value` / `--name=value` options and bare `--flag`s from
/// positional arguments. `--` ends option scanning.
pub(crate) fn scan_args(
    args: &[String],
    value_opts: &[&str],
    flag_opts: &[&str],
) -> anyhow::Result<ScannedArgs> {
    let mut scanned = ScannedArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            scanned.positional.extend(iter.by_ref().cloned());
            break;
        }

        let Some(body) = arg.strip_prefix("--") else {
            scanned.positional.push(arg.clone());
            continue;
        };

        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (body, None),
        };

        if flag_opts.contains(&name) {
            scanned.flags.insert(name.to_string());
        } else if value_opts.contains(&name) {
            let value = match inline {
                Some(value) => value,
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| anyhow!("--{name} requires a value"))?,
            };
            scanned.options.push((name.to_string(), value));
        } else {
            return Err(anyhow!("unknown option: --{name}"));
        }
    }

    Ok(scanned)
}

pub(crate) fn parse_id(token: &str) -> anyhow::Result<u64> {
    token
        .parse::<u64>()
        .with_context(|| format!("invalid id: {token}"))
}

pub(crate) fn parse_index(token: &str) -> anyhow::Result<usize> {
    token
        .parse::<usize>()
        .with_context(|| format!("invalid position: {token}"))
}

/// Parses task ids and checks that each exists.
pub(crate) fn parse_task_ids(ws: &Workspace, tokens: &[String]) -> anyhow::Result<Vec<TaskId>> {
    if tokens.is_empty() {
        return Err(anyhow!("at least one task id is required"));
    }

    let mut ids = Vec::with_capacity(tokens.len());
    for token in tokens {
        let id = parse_id(token)?;
        if ws.task(id).is_none() {
            return Err(anyhow!("task {id} not found"));
        }
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    info!(count = ids.len(), "resolved task ids");
    Ok(ids)
}
