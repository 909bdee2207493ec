//! Synheart Sync - Daily wearable metrics into a date-keyed CSV time series
//!
//! A run fetches one day of metrics from a fitness provider, flattens them
//! into a single record and upserts that record into a table persisted as
//! CSV: provider fetch → metric extraction → flattening → upsert → storage.
//!
//! ## Modules
//!
//! - **flatten / table**: pure record flattening and the date-keyed upsert
//! - **adapters / source / store**: vendor payloads, providers and backends
//! - **report / pipeline / config**: record assembly and the sync run

pub mod adapters;
pub mod config;
pub mod error;
pub mod flatten;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;
pub mod table;
pub mod types;

pub use error::SyncError;
pub use flatten::flatten;
pub use pipeline::{SyncOptions, SyncOutcome, SyncPipeline};
pub use table::{upsert, Table};
pub use types::{FieldValue, FlatRecord};

/// Crate version reported by the CLI
pub const SYNC_VERSION: &str = env!("CARGO_PKG_VERSION");
