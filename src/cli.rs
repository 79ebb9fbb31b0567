//! Command-line front ends for the coordinator and the folder watcher.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, error, info};

use crate::app_dirs;
use crate::config::{self, ConfigOverrides, SyncConfig};
use crate::remote::RestRemote;
use crate::sync::{
    Coordinator, ForceOptions, RunLock, RunSummary, SyncError, TriggerMode, force_upload,
    handle_created_folder, scan_folders,
};
use crate::tracking::{DEFAULT_RECENT_BATCHES, StatusReport, TrackingStore};
use crate::watch::FolderWatcher;

/// Upload capture folders to the remote store and track their status.
#[derive(Debug, Parser)]
#[command(name = "capsync", version)]
pub struct Cli {
    /// Directory containing capture folders.
    pub base_path: PathBuf,
    /// Only scan and record folders; upload nothing.
    #[arg(long)]
    pub scan_only: bool,
    /// Folders per chunk.
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Attempts per folder before it is no longer retried.
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Tracking store file.
    #[arg(long, alias = "db-path")]
    pub store_path: Option<PathBuf>,
    /// Print folder counts and recent batches, then exit.
    #[arg(long)]
    pub status: bool,
    /// Upload this folder regardless of its tracked state.
    #[arg(long)]
    pub force_folder: Option<PathBuf>,
    /// With --force-folder: wait for the folder to settle and retry failures.
    #[arg(long, requires = "force_folder")]
    pub wait_and_retry: bool,
    /// Config file to use instead of the one in the app directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Watch a directory and upload capture folders as they appear.
#[derive(Debug, Parser)]
#[command(name = "capsync-watch", version)]
pub struct WatchCli {
    /// Directory whose new subfolders trigger uploads.
    pub base_path: PathBuf,
    #[arg(long, value_enum, default_value_t = TriggerMode::Force)]
    pub mode: TriggerMode,
    /// Tracking store file.
    #[arg(long, alias = "db-path")]
    pub store_path: Option<PathBuf>,
    /// Config file to use instead of the one in the app directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the coordinator command and return the text to print.
pub fn run_coordinator(cli: &Cli) -> Result<String, SyncError> {
    let base = resolve_base(&cli.base_path)?;
    let overrides = ConfigOverrides {
        batch_size: cli.batch_size,
        max_retries: cli.max_retries,
        store_path: cli.store_path.clone(),
    };
    let config = config::load(cli.config.as_deref(), &overrides)?;
    let store = open_store(&config)?;

    if cli.status {
        return Ok(format_status_report(
            &store.status_report(DEFAULT_RECENT_BATCHES)?,
        ));
    }
    if cli.scan_only {
        let _lock = RunLock::acquire(&base)?;
        let scanned = scan_folders(&store, &base, &config.payload)?;
        return Ok(format!("Scanned {} folders under {}\n", scanned.folders, base.display()));
    }

    config.require_remote()?;
    let remote = RestRemote::new(&config.remote)?;
    let _lock = RunLock::acquire(&base)?;
    let coordinator = Coordinator::new(&store, &remote, &config);
    let summary = match &cli.force_folder {
        Some(folder) => {
            let folder = resolve_folder(&base, folder)?;
            let options = if cli.wait_and_retry {
                ForceOptions::wait_and_retry(config.sync.max_retries)
            } else {
                ForceOptions::once()
            };
            force_upload(&coordinator, &folder, options)?
        }
        None => coordinator.run(&base)?,
    };
    let mut out = format_summary(&summary);
    out.push('\n');
    out.push_str(&format_status_report(
        &store.status_report(DEFAULT_RECENT_BATCHES)?,
    ));
    Ok(out)
}

/// Watch the base path until the process is stopped.
///
/// Tracking store failures end the loop; anything else is logged and the
/// watcher keeps going.
pub fn run_watcher(cli: &WatchCli) -> Result<(), SyncError> {
    let base = resolve_base(&cli.base_path)?;
    let overrides = ConfigOverrides {
        store_path: cli.store_path.clone(),
        ..ConfigOverrides::default()
    };
    let config = config::load(cli.config.as_deref(), &overrides)?;
    config.require_remote()?;
    let store = open_store(&config)?;
    let remote = RestRemote::new(&config.remote)?;
    let coordinator = Coordinator::new(&store, &remote, &config);
    let mut watcher = FolderWatcher::new(&base)?;
    info!(base = %watcher.root().display(), mode = ?cli.mode, "Watching for new folders");

    loop {
        let folder = watcher.next_folder()?;
        let lock = RunLock::acquire(&base)?;
        debug!(
            lock = %lock.lock_path().display(),
            folder = %folder.display(),
            "Handling new folder"
        );
        match handle_created_folder(&coordinator, &base, &folder, cli.mode) {
            Ok(outcome) => {
                let summary = outcome.summary();
                info!(
                    folder = %folder.display(),
                    successful = summary.successful,
                    failed = summary.failed,
                    total = summary.total,
                    "Trigger handled"
                );
            }
            Err(err @ SyncError::Tracking(_)) => return Err(err),
            Err(err) => error!(folder = %folder.display(), error = %err, "Trigger failed"),
        }
    }
}

fn resolve_base(path: &Path) -> Result<PathBuf, SyncError> {
    let base = path
        .canonicalize()
        .map_err(|_| SyncError::InvalidBasePath(path.to_path_buf()))?;
    if !base.is_dir() {
        return Err(SyncError::InvalidBasePath(path.to_path_buf()));
    }
    Ok(base)
}

/// A relative folder that does not exist from the working directory is
/// looked up under the base path.
fn resolve_folder(base: &Path, folder: &Path) -> Result<PathBuf, SyncError> {
    let candidate = if folder.is_relative() && !folder.exists() {
        base.join(folder)
    } else {
        folder.to_path_buf()
    };
    candidate
        .canonicalize()
        .map_err(|_| SyncError::InvalidBasePath(folder.to_path_buf()))
}

fn open_store(config: &SyncConfig) -> Result<TrackingStore, SyncError> {
    let path = match &config.sync.store_path {
        Some(path) => path.clone(),
        None => app_dirs::default_store_path()?,
    };
    Ok(TrackingStore::open(path)?)
}

pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.is_empty() {
        out.push_str("No folders to process\n");
        return out;
    }
    let _ = writeln!(out, "Batch summary");
    let _ = writeln!(out, "  Total folders: {}", summary.total);
    let _ = writeln!(out, "  Successful:    {}", summary.successful);
    let _ = writeln!(out, "  Failed:        {}", summary.failed);
    if let Some(batch_id) = &summary.batch_id {
        let _ = writeln!(out, "  Batch id:      {batch_id}");
    }
    out
}

pub fn format_status_report(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Folder status ({} tracked)", report.total_folders);
    for (status, count) in &report.status_counts {
        let _ = writeln!(out, "  {status}: {count}");
    }
    if report.recent_batches.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Recent batches");
    for batch in &report.recent_batches {
        let status = batch.status.map(|status| status.as_str()).unwrap_or("unknown");
        let _ = writeln!(
            out,
            "  {} ({}): {}/{} successful, {} failed [{}]",
            batch.name, batch.id, batch.successful, batch.total_folders, batch.failed, status
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("capsync.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parses_legacy_db_path_alias() {
        let cli =
            Cli::try_parse_from(["capsync", "/data", "--db-path", "t.db", "--scan-only"]).unwrap();
        assert_eq!(cli.store_path, Some(PathBuf::from("t.db")));
        assert!(cli.scan_only);
    }

    #[test]
    fn wait_and_retry_requires_force_folder() {
        assert!(Cli::try_parse_from(["capsync", "/data", "--wait-and-retry"]).is_err());
        let cli = Cli::try_parse_from([
            "capsync",
            "/data",
            "--force-folder",
            "Batch1",
            "--wait-and-retry",
        ])
        .unwrap();
        assert!(cli.wait_and_retry);
    }

    #[test]
    fn watch_mode_defaults_to_force() {
        let cli = WatchCli::try_parse_from(["capsync-watch", "/data"]).unwrap();
        assert_eq!(cli.mode, TriggerMode::Force);
        let cli = WatchCli::try_parse_from(["capsync-watch", "/data", "--mode", "marker"]).unwrap();
        assert_eq!(cli.mode, TriggerMode::Marker);
    }

    #[test]
    fn invalid_base_path_exits_with_two() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let cli = Cli::try_parse_from(["capsync", missing.to_str().unwrap()]).unwrap();
        let err = run_coordinator(&cli).unwrap_err();
        assert!(matches!(err, SyncError::InvalidBasePath(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn status_works_without_remote_settings() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let store = dir.path().join("track.db");
        let cli = Cli::try_parse_from([
            "capsync",
            dir.path().to_str().unwrap(),
            "--status",
            "--config",
            config.to_str().unwrap(),
            "--store-path",
            store.to_str().unwrap(),
        ])
        .unwrap();
        let out = run_coordinator(&cli).unwrap();
        assert!(out.starts_with("Folder status (0 tracked)"));
    }

    #[test]
    fn summary_lists_totals_and_batch() {
        let text = format_summary(&RunSummary {
            successful: 2,
            failed: 1,
            total: 3,
            batch_id: Some("batch_1_abcd".into()),
        });
        assert!(text.contains("Total folders: 3"));
        assert!(text.contains("Batch id:      batch_1_abcd"));
        assert_eq!(format_summary(&RunSummary::default()), "No folders to process\n");
    }
}
