//! Pipeline orchestration
//!
//! One run performs a single fetch → transform → persist cycle:
//! 1. Collect every metric for the day (each fetch isolated)
//! 2. Assemble and flatten the day's record
//! 3. Load the persisted table (empty when absent or corrupt)
//! 4. Upsert the record; an invalid record aborts before anything is written
//! 5. Persist the full table, then optionally append the markdown summary

use chrono::{NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::adapters::{GarminAdapter, VendorPayloadAdapter};
use crate::error::SyncError;
use crate::report::{DailyMetrics, DEFAULT_ACTIVITY_LIMIT};
use crate::source::MetricSource;
use crate::store::TableStore;
use crate::table::Table;
use crate::types::FlatRecord;

/// Tunables for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Number of recent activities requested from the provider
    pub activity_limit: usize,
    /// Flatten raw provider payloads into the record as extra columns
    pub include_raw: bool,
    /// Append a markdown report for the day to this file
    pub summary_path: Option<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            include_raw: false,
            summary_path: None,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub run_id: Uuid,
    pub date: NaiveDate,
    /// Rows in the persisted table
    pub rows: usize,
    /// Columns in the persisted table
    pub columns: usize,
    /// Where the table was written
    pub location: String,
    /// Metrics recorded as not available
    pub unavailable: Vec<&'static str>,
}

/// Runs the daily sync against a source and a store
pub struct SyncPipeline<'a> {
    source: &'a dyn MetricSource,
    store: &'a dyn TableStore,
    adapter: &'a dyn VendorPayloadAdapter,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        source: &'a dyn MetricSource,
        store: &'a dyn TableStore,
        adapter: &'a dyn VendorPayloadAdapter,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            adapter,
            options,
        }
    }

    /// Pipeline using the Garmin adapter
    pub fn garmin(
        source: &'a dyn MetricSource,
        store: &'a dyn TableStore,
        options: SyncOptions,
    ) -> Self {
        Self::new(source, store, &GarminAdapter, options)
    }

    /// Fetch, transform and persist the metrics for `date`
    pub fn run(&self, date: NaiveDate) -> Result<SyncOutcome, SyncError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", %run_id, %date);
        let _enter = span.enter();

        let metrics =
            DailyMetrics::collect(self.source, self.adapter, date, self.options.activity_limit);
        let record = metrics.to_record(self.options.include_raw);

        let (table, location) = self.persist(record)?;

        if let Some(path) = &self.options.summary_path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            write!(file, "{}\n---\n", metrics.to_markdown())?;
            info!(path = %path.display(), "appended summary");
        }

        Ok(SyncOutcome {
            run_id,
            date,
            rows: table.len(),
            columns: table.columns().len(),
            location,
            unavailable: metrics.unavailable(),
        })
    }

    /// Upsert `record` into the stored table and write it back.
    ///
    /// The record is validated before the store is written; an invalid
    /// record leaves the persisted table untouched. Returns the table as
    /// written and its location.
    pub fn persist(&self, record: FlatRecord) -> Result<(Table, String), SyncError> {
        let existing = self.store.load()?;
        let mut table = Table::load_or_empty(existing.as_deref());
        let previous_rows = table.len();

        table.upsert(record)?;
        let csv = table.to_csv()?;
        let location = self.store.save(&csv, Utc::now())?;

        info!(
            rows = table.len(),
            added = table.len() > previous_rows,
            columns = table.columns().len(),
            %location,
            "table persisted"
        );

        Ok((table, location))
    }
}
