//! Error types for Synheart Sync

use thiserror::Error;

use crate::source::FetchError;
use crate::store::StoreError;

/// Errors that can occur during a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
