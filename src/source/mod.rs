//! Fitness data sources
//!
//! A source returns the raw provider JSON for each metric of a calendar day.
//! Each call is independent so that a failure in one endpoint can be reduced
//! to a "not available" value without touching the others.

mod export;
mod garmin;

pub use export::ExportDirSource;
pub use garmin::{GarminConnectClient, DEFAULT_API_BASE};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while fetching a single metric
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for fitness data providers
pub trait MetricSource {
    /// Daily summary statistics (includes the average stress level)
    fn daily_stats(&self, date: NaiveDate) -> Result<Value, FetchError>;

    /// Sleep detail for the night ending on `date`
    fn sleep(&self, date: NaiveDate) -> Result<Value, FetchError>;

    /// Heart-rate-variability summary
    fn hrv(&self, date: NaiveDate) -> Result<Value, FetchError>;

    /// Body battery samples
    fn body_battery(&self, date: NaiveDate) -> Result<Value, FetchError>;

    /// Most recent activities, newest first
    fn activities(&self, start: usize, limit: usize) -> Result<Value, FetchError>;
}
