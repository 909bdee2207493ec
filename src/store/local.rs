//! Local filesystem store

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{is_table_file, per_run_file_name, StoreError, TableStore, WriteMode};

/// Stores the table as a CSV file on disk
pub struct LocalStore {
    path: PathBuf,
    mode: WriteMode,
}

impl LocalStore {
    /// Rewrite the file at `path` on every run
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::UpdateInPlace,
        }
    }

    /// Create a new timestamped file inside `dir` on every run
    pub fn folder(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into(),
            mode: WriteMode::CreatePerRun,
        }
    }

    /// Most recently written per-run file in the folder
    fn latest_in_folder(&self) -> Result<Option<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<PathBuf> = None;
        for entry in entries {
            let path = entry?.path();
            let is_candidate = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_table_file);
            if is_candidate && latest.as_ref().map_or(true, |l| path > *l) {
                latest = Some(path);
            }
        }
        Ok(latest)
    }
}

impl TableStore for LocalStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let source = match self.mode {
            WriteMode::UpdateInPlace => Some(self.path.clone()),
            WriteMode::CreatePerRun => self.latest_in_folder()?,
        };

        let Some(path) = source else {
            return Ok(None);
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "loaded table");
                Ok(Some(text))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, csv: &str, written_at: DateTime<Utc>) -> Result<String, StoreError> {
        let target = match self.mode {
            WriteMode::UpdateInPlace => self.path.clone(),
            WriteMode::CreatePerRun => {
                fs::create_dir_all(&self.path)?;
                self.path.join(per_run_file_name(written_at))
            }
        };

        write_replace(&target, csv)?;
        Ok(target.display().to_string())
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_replace(target: &Path, contents: &str) -> io::Result<()> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, target)
}
