//! Run configuration
//!
//! Raw settings arrive as optional strings (typically from environment
//! variables via the CLI) and are validated into a [`SyncConfig`] that says
//! exactly which source and which store a run uses.

use std::path::PathBuf;

use crate::error::SyncError;
use crate::pipeline::SyncOptions;
use crate::report::DEFAULT_ACTIVITY_LIMIT;
use crate::source::{ExportDirSource, GarminConnectClient, MetricSource, DEFAULT_API_BASE};
use crate::store::{DriveStore, DriveTarget, LocalStore, TableStore, WriteMode};

/// Unvalidated settings, one field per environment variable
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    /// `GARMIN_TOKEN`
    pub garmin_token: Option<String>,
    /// `GARMIN_DISPLAY_NAME`
    pub garmin_display_name: Option<String>,
    /// `GARMIN_API_BASE`
    pub garmin_api_base: Option<String>,
    /// `GARMIN_EXPORT_DIR`
    pub garmin_export_dir: Option<PathBuf>,
    /// `DRIVE_ACCESS_TOKEN`
    pub drive_access_token: Option<String>,
    /// `DRIVE_FILE_ID`
    pub drive_file_id: Option<String>,
    /// `DRIVE_FOLDER_ID`
    pub drive_folder_id: Option<String>,
    /// `LOCAL_TABLE_PATH`
    pub local_table_path: Option<PathBuf>,
    /// `LOCAL_TABLE_DIR`
    pub local_table_dir: Option<PathBuf>,
    /// `SYNC_WRITE_MODE`
    pub write_mode: Option<WriteMode>,
    /// `SUMMARY_PATH`
    pub summary_path: Option<PathBuf>,
    /// `ACTIVITY_LIMIT`
    pub activity_limit: Option<usize>,
    /// `INCLUDE_RAW`
    pub include_raw: bool,
}

/// Where metrics come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    GarminConnect {
        token: String,
        display_name: String,
        api_base: String,
    },
    ExportDir(PathBuf),
}

/// Where the table lives
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Drive {
        access_token: String,
        target: DriveTarget,
    },
    LocalFile(PathBuf),
    LocalFolder(PathBuf),
}

impl StoreConfig {
    pub fn mode(&self) -> WriteMode {
        match self {
            StoreConfig::Drive { target, .. } => target.mode(),
            StoreConfig::LocalFile(_) => WriteMode::UpdateInPlace,
            StoreConfig::LocalFolder(_) => WriteMode::CreatePerRun,
        }
    }
}

/// Validated configuration for one run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub options: SyncOptions,
}

impl SyncConfig {
    /// Validate raw settings
    pub fn from_settings(settings: SyncSettings) -> Result<Self, SyncError> {
        let source = resolve_source(&settings)?;
        let store = resolve_store(&settings)?;

        let activity_limit = settings.activity_limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        if activity_limit == 0 {
            return Err(SyncError::Config("ACTIVITY_LIMIT must be at least 1".into()));
        }

        Ok(Self {
            source,
            store,
            options: SyncOptions {
                activity_limit,
                include_raw: settings.include_raw,
                summary_path: settings.summary_path,
            },
        })
    }

    /// Build the configured metric source
    pub fn build_source(&self) -> Result<Box<dyn MetricSource>, SyncError> {
        Ok(match &self.source {
            SourceConfig::GarminConnect {
                token,
                display_name,
                api_base,
            } => Box::new(
                GarminConnectClient::new(token.clone(), display_name.clone())?
                    .with_base_url(api_base.clone()),
            ),
            SourceConfig::ExportDir(dir) => Box::new(ExportDirSource::new(dir.clone())),
        })
    }

    /// Build the configured table store
    pub fn build_store(&self) -> Result<Box<dyn TableStore>, SyncError> {
        Ok(match &self.store {
            StoreConfig::Drive {
                access_token,
                target,
            } => Box::new(DriveStore::new(access_token.clone(), target.clone())?),
            StoreConfig::LocalFile(path) => Box::new(LocalStore::file(path.clone())),
            StoreConfig::LocalFolder(dir) => Box::new(LocalStore::folder(dir.clone())),
        })
    }
}

fn resolve_source(settings: &SyncSettings) -> Result<SourceConfig, SyncError> {
    match (&settings.garmin_token, &settings.garmin_export_dir) {
        (Some(_), Some(_)) => Err(SyncError::Config(
            "set either GARMIN_TOKEN or GARMIN_EXPORT_DIR, not both".into(),
        )),
        (None, Some(dir)) => Ok(SourceConfig::ExportDir(dir.clone())),
        (Some(token), None) => {
            let display_name = settings.garmin_display_name.clone().ok_or_else(|| {
                SyncError::Config("GARMIN_DISPLAY_NAME is required with GARMIN_TOKEN".into())
            })?;
            Ok(SourceConfig::GarminConnect {
                token: token.clone(),
                display_name,
                api_base: settings
                    .garmin_api_base
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            })
        }
        (None, None) => Err(SyncError::Config(
            "no metric source: set GARMIN_TOKEN and GARMIN_DISPLAY_NAME, or GARMIN_EXPORT_DIR"
                .into(),
        )),
    }
}

fn resolve_store(settings: &SyncSettings) -> Result<StoreConfig, SyncError> {
    let wants_drive = settings.drive_file_id.is_some() || settings.drive_folder_id.is_some();
    let wants_local = settings.local_table_path.is_some() || settings.local_table_dir.is_some();

    match (wants_drive, wants_local) {
        (true, true) => Err(SyncError::Config(
            "configure either a Drive target or a local target, not both".into(),
        )),
        (true, false) => {
            let access_token = settings.drive_access_token.clone().ok_or_else(|| {
                SyncError::Config("DRIVE_ACCESS_TOKEN is required for a Drive target".into())
            })?;
            let target = pick_target(
                settings.drive_file_id.clone(),
                settings.drive_folder_id.clone(),
                settings.write_mode,
                ("DRIVE_FILE_ID", "DRIVE_FOLDER_ID"),
            )?;
            let target = match target {
                Target::File(id) => DriveTarget::File(id),
                Target::Folder(id) => DriveTarget::Folder(id),
            };
            Ok(StoreConfig::Drive {
                access_token,
                target,
            })
        }
        (false, true) => {
            let target = pick_target(
                settings.local_table_path.clone(),
                settings.local_table_dir.clone(),
                settings.write_mode,
                ("LOCAL_TABLE_PATH", "LOCAL_TABLE_DIR"),
            )?;
            Ok(match target {
                Target::File(path) => StoreConfig::LocalFile(path),
                Target::Folder(dir) => StoreConfig::LocalFolder(dir),
            })
        }
        (false, false) => Err(SyncError::Config(
            "no table store: set DRIVE_FILE_ID, DRIVE_FOLDER_ID, LOCAL_TABLE_PATH or LOCAL_TABLE_DIR"
                .into(),
        )),
    }
}

enum Target<T> {
    File(T),
    Folder(T),
}

/// Choose between a file and a folder address.
///
/// When both are configured the write mode must say which one to use; when
/// only one is configured an explicit mode must agree with it.
fn pick_target<T>(
    file: Option<T>,
    folder: Option<T>,
    mode: Option<WriteMode>,
    (file_var, folder_var): (&str, &str),
) -> Result<Target<T>, SyncError> {
    match (file, folder, mode) {
        (Some(f), None, None | Some(WriteMode::UpdateInPlace)) => Ok(Target::File(f)),
        (None, Some(d), None | Some(WriteMode::CreatePerRun)) => Ok(Target::Folder(d)),
        (Some(f), Some(_), Some(WriteMode::UpdateInPlace)) => Ok(Target::File(f)),
        (Some(_), Some(d), Some(WriteMode::CreatePerRun)) => Ok(Target::Folder(d)),
        (Some(_), Some(_), None) => Err(SyncError::Config(format!(
            "both {file_var} and {folder_var} are set; choose one with SYNC_WRITE_MODE"
        ))),
        (Some(_), None, Some(WriteMode::CreatePerRun)) => Err(SyncError::Config(format!(
            "SYNC_WRITE_MODE=create needs {folder_var}"
        ))),
        (None, Some(_), Some(WriteMode::UpdateInPlace)) => Err(SyncError::Config(format!(
            "SYNC_WRITE_MODE=update needs {file_var}"
        ))),
        (None, None, _) => Err(SyncError::Config(format!(
            "set {file_var} or {folder_var}"
        ))),
    }
}
