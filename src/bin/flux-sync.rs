//! flux-sync - Sync yesterday's wearable metrics into a CSV time series
//!
//! Every option falls back to an environment variable, so a scheduled job
//! can run the binary with no arguments. One invocation performs one
//! fetch → upsert → persist cycle and prints a single status line.

use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

use synheart_sync::config::{SyncConfig, SyncSettings};
use synheart_sync::pipeline::SyncPipeline;
use synheart_sync::store::WriteMode;
use synheart_sync::table::DATE_FORMAT;
use synheart_sync::{SyncError, SYNC_VERSION};

/// flux-sync - Daily wearable metrics into a date-keyed CSV table
#[derive(Parser)]
#[command(name = "flux-sync")]
#[command(author = "Synheart AI Inc")]
#[command(version = SYNC_VERSION)]
#[command(about = "Upsert one day of wearable metrics into a CSV time series", long_about = None)]
struct Cli {
    /// Day to sync (YYYY-MM-DD); defaults to yesterday
    #[arg(long, env = "SYNC_DATE", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Garmin Connect bearer token
    #[arg(long, env = "GARMIN_TOKEN", hide_env_values = true)]
    garmin_token: Option<String>,

    /// Garmin Connect display name
    #[arg(long, env = "GARMIN_DISPLAY_NAME")]
    garmin_display_name: Option<String>,

    /// Garmin Connect API host
    #[arg(long, env = "GARMIN_API_BASE")]
    garmin_api_base: Option<String>,

    /// Read payloads from a directory of JSON exports instead of the API
    #[arg(long, env = "GARMIN_EXPORT_DIR")]
    garmin_export_dir: Option<PathBuf>,

    /// Google Drive OAuth access token
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    drive_access_token: Option<String>,

    /// Drive file id to update in place
    #[arg(long, env = "DRIVE_FILE_ID")]
    drive_file_id: Option<String>,

    /// Drive folder id to create a new file in on every run
    #[arg(long, env = "DRIVE_FOLDER_ID")]
    drive_folder_id: Option<String>,

    /// Local CSV file to update in place
    #[arg(long, env = "LOCAL_TABLE_PATH")]
    local_table_path: Option<PathBuf>,

    /// Local folder to create a new CSV file in on every run
    #[arg(long, env = "LOCAL_TABLE_DIR")]
    local_table_dir: Option<PathBuf>,

    /// Write mode: "update" (one file) or "create" (new file per run)
    #[arg(long, env = "SYNC_WRITE_MODE", value_parser = parse_write_mode)]
    write_mode: Option<WriteMode>,

    /// Append a markdown report for the day to this file
    #[arg(long, env = "SUMMARY_PATH")]
    summary_path: Option<PathBuf>,

    /// Number of recent activities to request
    #[arg(long, env = "ACTIVITY_LIMIT")]
    activity_limit: Option<usize>,

    /// Also flatten the raw stats/sleep/HRV payloads into the row
    #[arg(long, env = "INCLUDE_RAW")]
    include_raw: bool,

    /// Log filter (e.g. "info", "synheart_sync=debug")
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn settings(&self) -> SyncSettings {
        SyncSettings {
            garmin_token: self.garmin_token.clone(),
            garmin_display_name: self.garmin_display_name.clone(),
            garmin_api_base: self.garmin_api_base.clone(),
            garmin_export_dir: self.garmin_export_dir.clone(),
            drive_access_token: self.drive_access_token.clone(),
            drive_file_id: self.drive_file_id.clone(),
            drive_folder_id: self.drive_folder_id.clone(),
            local_table_path: self.local_table_path.clone(),
            local_table_dir: self.local_table_dir.clone(),
            write_mode: self.write_mode,
            summary_path: self.summary_path.clone(),
            activity_limit: self.activity_limit,
            include_raw: self.include_raw,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("invalid date {s:?}: {e}"))
}

fn parse_write_mode(s: &str) -> Result<WriteMode, String> {
    s.parse()
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let date = cli
        .date
        .unwrap_or_else(|| Local::now().date_naive() - Duration::days(1));

    match run(&cli, date) {
        Ok(status) => {
            println!("{status}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let report = CliError::from(&e);
            eprintln!(
                "{}",
                serde_json::to_string(&report).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, date: NaiveDate) -> Result<String, SyncError> {
    let config = SyncConfig::from_settings(cli.settings())?;
    let source = config.build_source()?;
    let store = config.build_store()?;

    let pipeline = SyncPipeline::garmin(source.as_ref(), store.as_ref(), config.options.clone());
    let outcome = pipeline.run(date)?;

    let mut status = format!(
        "Data synced for {} ({} rows, {} columns) -> {}",
        outcome.date, outcome.rows, outcome.columns, outcome.location
    );
    if !outcome.unavailable.is_empty() {
        status.push_str(&format!("; unavailable: {}", outcome.unavailable.join(", ")));
    }
    Ok(status)
}

// Error reporting

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<&SyncError> for CliError {
    fn from(e: &SyncError) -> Self {
        let (code, hint) = match e {
            SyncError::Config(_) => (
                "CONFIG_ERROR",
                Some("Check the environment variables listed in --help"),
            ),
            SyncError::InvalidRecord(_) => (
                "INVALID_RECORD",
                Some("The stored table was left unchanged"),
            ),
            SyncError::Fetch(_) => (
                "FETCH_ERROR",
                Some("Check GARMIN_TOKEN and network access"),
            ),
            SyncError::Store(_) => (
                "STORE_ERROR",
                Some("Check the store credentials and target id"),
            ),
            SyncError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
            SyncError::CsvError(_) | SyncError::EncodingError(_) => ("ENCODING_ERROR", None),
        };

        CliError {
            code: code.to_string(),
            message: e.to_string(),
            hint: hint.map(str::to_string),
        }
    }
}
