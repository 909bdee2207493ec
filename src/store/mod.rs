//! Table storage backends
//!
//! A store persists the whole CSV table. It either rewrites one fixed file
//! in place or creates a new file per run inside a folder; the choice is
//! explicit through [`WriteMode`].

mod drive;
mod local;

pub use drive::{DriveStore, DriveTarget};
pub use local::LocalStore;

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// File name prefix for per-run table files
pub const FILE_PREFIX: &str = "health_metrics_";

/// UTC write timestamp embedded in per-run file names; sorts by name
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected response: {0}")]
    Response(String),
}

/// Whether a run overwrites one file or creates a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Rewrite a single, stable file
    UpdateInPlace,
    /// Write a new dated file into a folder on every run
    CreatePerRun,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::UpdateInPlace => "update",
            WriteMode::CreatePerRun => "create",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" | "update-in-place" => Ok(WriteMode::UpdateInPlace),
            "create" | "create-per-run" => Ok(WriteMode::CreatePerRun),
            other => Err(format!(
                "unknown write mode {other:?} (expected \"update\" or \"create\")"
            )),
        }
    }
}

/// Trait for table storage backends
pub trait TableStore {
    /// Fetch the current table text, or `None` when nothing is stored yet
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist the full table; returns where it was written.
    ///
    /// Per-run stores name the new file after `written_at`, so the newest
    /// write is always the one loaded next, even after a backfill run.
    fn save(&self, csv: &str, written_at: DateTime<Utc>) -> Result<String, StoreError>;
}

/// File name used for a per-run table written at `written_at`
pub fn per_run_file_name(written_at: DateTime<Utc>) -> String {
    format!("{FILE_PREFIX}{}.csv", written_at.format(STAMP_FORMAT))
}

fn is_table_file(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(".csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mode_parse() {
        assert_eq!("update".parse::<WriteMode>(), Ok(WriteMode::UpdateInPlace));
        assert_eq!(" Create ".parse::<WriteMode>(), Ok(WriteMode::CreatePerRun));
        assert!("append".parse::<WriteMode>().is_err());
        assert_eq!(WriteMode::CreatePerRun.to_string(), "create");
    }

    #[test]
    fn test_per_run_file_name() {
        let written_at = DateTime::parse_from_rfc3339("2024-01-16T06:30:00.25Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = per_run_file_name(written_at);
        assert_eq!(name, "health_metrics_20240116T063000250000Z.csv");
        assert!(is_table_file(&name));
        assert!(!is_table_file("notes.csv"));
    }

    #[test]
    fn test_per_run_names_sort_by_write_time() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-16T23:59:59.999Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-17T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(per_run_file_name(later) > per_run_file_name(earlier));
    }
}
