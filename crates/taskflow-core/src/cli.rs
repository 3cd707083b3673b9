use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: task query, filter and sort engine",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskflowrc")]
    pub taskflowrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 1 {
        "error"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` tokens out of the argument
/// list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let Some((first, tail)) = tokens.split_first() else {
            let default = cfg
                .get("default.command")
                .unwrap_or_else(|| "list".to_string());
            debug!(command = %default, "no explicit command, using default");
            return default_invocation(&default, &[]);
        };

        let known = known_command_names();
        if let Some(full) = expand_command_abbrev(first, &known) {
            debug!(token = %first, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                args: tail.to_vec(),
            });
        }

        let default = cfg
            .get("default.command")
            .unwrap_or_else(|| "list".to_string());
        warn!(
            token = %first,
            command = %default,
            "no command detected; passing all terms to the default command"
        );
        default_invocation(&default, &tokens)
    }
}

/// `default.command` may carry its own arguments, e.g. `list active`.
fn default_invocation(default: &str, extra: &[String]) -> anyhow::Result<Invocation> {
    let mut words = default.split_whitespace();
    let head = words
        .next()
        .ok_or_else(|| anyhow!("default.command is empty"))?;
    let command = expand_command_abbrev(head, &known_command_names())
        .ok_or_else(|| anyhow!("default.command names an unknown command: {head}"))?;

    let mut args: Vec<String> = words.map(str::to_string).collect();
    args.extend(extra.iter().cloned());
    Ok(Invocation {
        command: command.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::{Invocation, preprocess_args};
    use crate::config::Config;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_tokens_become_overrides() {
        let pre = preprocess_args(&os(&["taskflow", "rc.color=off", "list", "rc.confirmation:no"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["taskflow", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.confirmation".to_string(), "no".to_string()),
            ]
        );
    }

    #[test]
    fn abbreviated_commands_expand() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["tog", "3"])).expect("parse");
        assert_eq!(inv.command, "toggle");
        assert_eq!(inv.args, vec!["3"]);

        let inv = Invocation::parse(&cfg, os(&["category", "add", "Home"])).expect("parse");
        assert_eq!(inv.command, "category");
    }

    #[test]
    fn empty_and_unknown_fall_back_to_default() {
        let mut cfg = Config::default();
        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "list");
        assert!(inv.args.is_empty());

        cfg.apply_overrides([("default.command".to_string(), "list active".to_string())]);
        let inv = Invocation::parse(&cfg, os(&["completed"])).expect("parse");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.args, vec!["active", "completed"]);
    }
}
