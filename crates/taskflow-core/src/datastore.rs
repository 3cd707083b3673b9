use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::seed::seed_workspace;
use crate::task::Workspace;

const WORKSPACE_FILE: &str = "workspace.json";

/// The whole workspace lives in one JSON document, rewritten atomically on
/// every change.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub workspace_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let workspace_path = data_dir.join(WORKSPACE_FILE);
        info!(
            data_dir = %data_dir.display(),
            workspace = %workspace_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            workspace_path,
        })
    }

    pub fn exists(&self) -> bool {
        self.workspace_path.exists()
    }

    /// Reads the workspace. A missing file yields the starter workspace when
    /// `seed` is set (written out immediately) and an empty one otherwise.
    #[tracing::instrument(skip(self, now))]
    pub fn load(&self, seed: bool, now: DateTime<Utc>) -> anyhow::Result<Workspace> {
        if !self.exists() {
            if !seed {
                debug!("no workspace file; starting empty");
                return Ok(Workspace::default());
            }
            let ws = seed_workspace(now);
            info!(
                tasks = ws.tasks.len(),
                categories = ws.categories.len(),
                "seeding new workspace"
            );
            self.save(&ws)?;
            return Ok(ws);
        }

        let raw = fs::read_to_string(&self.workspace_path)
            .with_context(|| format!("failed reading {}", self.workspace_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Workspace::default());
        }

        let ws: Workspace = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.workspace_path.display()))?;
        debug!(
            tasks = ws.tasks.len(),
            categories = ws.categories.len(),
            saved = ws.saved_searches.len(),
            "loaded workspace"
        );
        Ok(ws)
    }

    #[tracing::instrument(skip(self, ws))]
    pub fn save(&self, ws: &Workspace) -> anyhow::Result<()> {
        save_json_atomic(&self.workspace_path, ws)
            .with_context(|| format!("failed to save {WORKSPACE_FILE}"))
    }
}

#[tracing::instrument(skip(path, ws))]
fn save_json_atomic(path: &Path, ws: &Workspace) -> anyhow::Result<()> {
    debug!(file = %path.display(), tasks = ws.tasks.len(), "saving workspace atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, ws)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::DataStore;
    use crate::task::Task;

    #[test]
    fn seeds_once_then_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(dir.path()).expect("open");
        let now = Utc.with_ymd_and_hms(2025, 7, 16, 12, 0, 0).unwrap();

        assert!(!store.exists());
        let mut ws = store.load(true, now).expect("seed");
        assert!(store.exists());
        assert_eq!(ws.tasks.len(), 10);

        ws.tasks.push(Task::new(11, "Water plants".into(), now));
        store.save(&ws).expect("save");

        let reread = store.load(true, now).expect("load");
        assert_eq!(reread, ws);
    }

    #[test]
    fn unseeded_store_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(&dir.path().join("nested")).expect("open");
        let now = Utc.with_ymd_and_hms(2025, 7, 16, 12, 0, 0).unwrap();

        let ws = store.load(false, now).expect("load");
        assert!(ws.tasks.is_empty());
        assert!(!store.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(dir.path()).expect("open");
        std::fs::write(&store.workspace_path, "{not json").expect("write");

        let now = Utc.with_ymd_and_hms(2025, 7, 16, 12, 0, 0).unwrap();
        let err = store.load(true, now).unwrap_err();
        assert!(format!("{err:#}").contains("failed parsing"));
    }
}
