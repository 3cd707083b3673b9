use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::ops::OrphanPolicy;
use crate::query::CategorySort;
use crate::saved::DEFAULT_RECENT_LIMIT;
use crate::validate::{
  DEFAULT_DESCRIPTION_MAX,
  DEFAULT_TITLE_MAX,
  Limits
};

const DEFAULTS: &[(&str, &str)] = &[
  ("data.location", "~/.taskflow"),
  ("default.command", "list"),
  ("color", "on"),
  ("confirmation", "on"),
  ("category.sort", "name"),
  ("category.delete", "keep"),
  ("search.recent.limit", "5"),
  ("task.title.max", "100"),
  ("task.description.max", "500"),
  ("seed", "on")
];

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (
            (*k).to_string(),
            (*v).to_string()
          )
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading taskflowrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no taskflowrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn confirmation(&self) -> bool {
    self
      .get_bool("confirmation")
      .unwrap_or(true)
  }

  pub fn seed(&self) -> bool {
    self.get_bool("seed").unwrap_or(true)
  }

  pub fn limits(
    &self
  ) -> anyhow::Result<Limits> {
    Ok(Limits {
      title_max:       self.get_usize(
        "task.title.max",
        DEFAULT_TITLE_MAX
      )?,
      description_max: self.get_usize(
        "task.description.max",
        DEFAULT_DESCRIPTION_MAX
      )?
    })
  }

  pub fn recent_limit(
    &self
  ) -> anyhow::Result<usize> {
    self.get_usize(
      "search.recent.limit",
      DEFAULT_RECENT_LIMIT
    )
  }

  pub fn category_sort(
    &self
  ) -> anyhow::Result<CategorySort> {
    match self.get("category.sort") {
      | Some(raw) => raw.parse(),
      | None => {
        Ok(CategorySort::default())
      }
    }
  }

  pub fn orphan_policy(
    &self
  ) -> anyhow::Result<OrphanPolicy> {
    match self.get("category.delete")
    {
      | Some(raw) => raw.parse(),
      | None => {
        Ok(OrphanPolicy::default())
      }
    }
  }

  fn get_usize(
    &self,
    key: &str,
    default: usize
  ) -> anyhow::Result<usize> {
    match self.map.get(key) {
      | Some(raw) => {
        raw.trim().parse().with_context(
          || {
            format!(
              "invalid {key}: {raw}"
            )
          }
        )
      }
      | None => Ok(default)
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }

  match cfg.get("data.location") {
    | Some(value) => {
      Ok(expand_tilde(Path::new(
        &value
      )))
    }
    | None => default_data_dir()
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("TASKFLOWRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.taskflowrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".taskflowrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".taskflow"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::Config;
  use crate::ops::OrphanPolicy;
  use crate::query::CategorySort;

  #[test]
  fn defaults_cover_every_knob() {
    let cfg = Config::default();
    assert_eq!(
      cfg.get("default.command"),
      Some("list".to_string())
    );
    assert!(cfg.confirmation());
    assert!(cfg.seed());
    assert_eq!(
      cfg.limits().unwrap().title_max,
      100
    );
    assert_eq!(
      cfg.recent_limit().unwrap(),
      5
    );
    assert_eq!(
      cfg.orphan_policy().unwrap(),
      OrphanPolicy::KeepDangling
    );
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "category.sort=count\n"
    )
    .expect("write include");
    let rc = dir.path().join("main.rc");
    fs::write(
      &rc,
      "# comment\nconfirmation=off  # \
       trailing\ninclude extra.rc\n\
       task.title.max=40\n"
    )
    .expect("write rc");

    let mut cfg =
      Config::load(Some(&rc)).expect("load");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert!(!cfg.confirmation());
    assert_eq!(
      cfg.category_sort().unwrap(),
      CategorySort::TaskCount
    );
    assert_eq!(
      cfg.limits().unwrap().title_max,
      40
    );

    cfg.apply_overrides([(
      "rc.category.delete".to_string(),
      "uncategorize".to_string()
    )]);
    assert_eq!(
      cfg.orphan_policy().unwrap(),
      OrphanPolicy::Uncategorize
    );
  }

  #[test]
  fn malformed_numbers_are_reported() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "search.recent.limit".to_string(),
      "many".to_string()
    )]);
    assert!(cfg.recent_limit().is_err());
  }
}
