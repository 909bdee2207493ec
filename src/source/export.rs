//! Offline source backed by a directory of exported JSON payloads
//!
//! Expected layout: `stats.json`, `sleep.json`, `hrv.json`,
//! `body_battery.json` and `activities.json`. A `<date>/` subdirectory,
//! when present, takes precedence over the top-level files.

use chrono::NaiveDate;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FetchError, MetricSource};

/// Reads provider payloads from disk
pub struct ExportDirSource {
    root: PathBuf,
}

impl ExportDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, date: Option<NaiveDate>, name: &str) -> Result<Value, FetchError> {
        let file = format!("{name}.json");
        let path = date
            .map(|d| self.root.join(d.to_string()).join(&file))
            .filter(|p| p.is_file())
            .unwrap_or_else(|| self.root.join(&file));
        read_json(&path)
    }
}

fn read_json(path: &Path) -> Result<Value, FetchError> {
    let text = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

impl MetricSource for ExportDirSource {
    fn daily_stats(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.read(Some(date), "stats")
    }

    fn sleep(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.read(Some(date), "sleep")
    }

    fn hrv(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.read(Some(date), "hrv")
    }

    fn body_battery(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.read(Some(date), "body_battery")
    }

    fn activities(&self, start: usize, limit: usize) -> Result<Value, FetchError> {
        let all = self.read(None, "activities")?;
        match all {
            Value::Array(items) => Ok(Value::Array(
                items.into_iter().skip(start).take(limit).collect(),
            )),
            other => Ok(other),
        }
    }
}
