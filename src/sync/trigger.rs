//! Runs started by a newly created folder rather than a manual invocation.

use std::path::Path;
use std::thread;

use tracing::{info, warn};

use crate::capture::readiness::{Readiness, ReadinessMode, build_policy};
use crate::capture::{count_files, fingerprint, folder_name};
use crate::tracking::BatchStatus;

use super::coordinator::Coordinator;
use super::{RunSummary, SyncError};

/// How the watcher reacts to a new folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TriggerMode {
    /// Wait for the folder to settle and upload it directly.
    #[default]
    Force,
    /// Wait for the completion marker, then run over the whole base directory.
    Marker,
}

/// Controls a forced single-folder upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceOptions {
    /// Wait for the folder to stop changing before the first attempt.
    pub wait_for_ready: bool,
    /// Upload attempts before giving up.
    pub attempts: u32,
}

impl ForceOptions {
    /// One immediate attempt.
    pub fn once() -> Self {
        Self {
            wait_for_ready: false,
            attempts: 1,
        }
    }

    /// Wait for readiness, then try up to `max_retries` times.
    pub fn wait_and_retry(max_retries: u32) -> Self {
        Self {
            wait_for_ready: true,
            attempts: max_retries.max(1),
        }
    }
}

/// What a watcher trigger ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The new folder was uploaded on its own.
    Forced(RunSummary),
    /// The forced upload failed and the whole base directory was processed.
    Fallback(RunSummary),
    /// The whole base directory was processed after the marker wait.
    WholeBase(RunSummary),
}

impl TriggerOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Forced(summary) | Self::Fallback(summary) | Self::WholeBase(summary) => summary,
        }
    }
}

/// Upload `folder` regardless of its tracked fingerprint or retry count.
///
/// The folder is upserted first and gets a single-folder batch, so the outcome
/// lands in the tracking store and sidecar like any other run.
pub fn force_upload(
    coordinator: &Coordinator<'_>,
    folder: &Path,
    options: ForceOptions,
) -> Result<RunSummary, SyncError> {
    let config = coordinator.config();
    let store = coordinator.store();
    if !folder.is_dir() {
        return Err(SyncError::InvalidBasePath(folder.to_path_buf()));
    }
    let forced_failure = |reason: String| SyncError::ForcedUploadFailed {
        folder: folder.to_path_buf(),
        reason,
    };

    if options.wait_for_ready {
        let policy = build_policy(ReadinessMode::Stability, &config.readiness);
        if let Readiness::NotReady(reason) = policy.wait_until_ready(folder) {
            return Err(forced_failure(reason.as_str().to_string()));
        }
    }

    let excluded = config.payload.sidecar_names();
    let name = folder_name(folder);
    let digest = fingerprint(folder, &excluded);
    store.upsert_folder(folder, &name, count_files(folder), &digest)?;
    let batch_id = store.create_batch(&format!("force_{name}"), 1)?;
    info!(
        folder = %folder.display(),
        batch = %batch_id,
        attempts = options.attempts,
        "Forcing upload"
    );

    let attempts = options.attempts.max(1);
    let mut uploaded = false;
    for attempt in 1..=attempts {
        if coordinator.process_folder(folder, &digest, &batch_id)? {
            uploaded = true;
            break;
        }
        if attempt < attempts {
            warn!(folder = %folder.display(), attempt, attempts, "Forced upload failed; retrying");
            let delay = config.sync.retry_delay();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    let summary = RunSummary {
        successful: u64::from(uploaded),
        failed: u64::from(!uploaded),
        total: 1,
        batch_id: Some(batch_id.clone()),
    };
    store.update_batch(
        &batch_id,
        summary.successful,
        summary.failed,
        Some(BatchStatus::Completed),
    )?;
    if uploaded {
        Ok(summary)
    } else {
        let reason = store
            .get_folder(folder)?
            .and_then(|record| record.error_message)
            .unwrap_or_else(|| format!("failed after {attempts} attempt(s)"));
        Err(forced_failure(reason))
    }
}

/// Wait for the completion marker in `folder`, then process all of `base`.
///
/// A marker that never appears is logged and the run still happens.
pub fn run_marker_gated(
    coordinator: &Coordinator<'_>,
    base: &Path,
    folder: &Path,
) -> Result<RunSummary, SyncError> {
    let policy = build_policy(ReadinessMode::MarkerGated, &coordinator.config().readiness);
    match policy.wait_until_ready(folder) {
        Readiness::Ready { waited } => {
            info!(
                folder = %folder.display(),
                waited_ms = waited.as_millis() as u64,
                "Folder ready"
            );
        }
        Readiness::NotReady(reason) => {
            warn!(
                folder = %folder.display(),
                reason = reason.as_str(),
                "Folder not ready; processing base directory anyway"
            );
        }
    }
    coordinator.run(base)
}

/// React to a folder created directly under `base`.
///
/// Tracking store failures propagate; any other forced-upload failure falls
/// back to a run over the whole base directory.
pub fn handle_created_folder(
    coordinator: &Coordinator<'_>,
    base: &Path,
    folder: &Path,
    mode: TriggerMode,
) -> Result<TriggerOutcome, SyncError> {
    info!(folder = %folder.display(), mode = ?mode, "New folder detected");
    match mode {
        TriggerMode::Marker => {
            run_marker_gated(coordinator, base, folder).map(TriggerOutcome::WholeBase)
        }
        TriggerMode::Force => {
            let options = ForceOptions {
                wait_for_ready: true,
                attempts: 1,
            };
            match force_upload(coordinator, folder, options) {
                Ok(summary) => Ok(TriggerOutcome::Forced(summary)),
                Err(err @ SyncError::Tracking(_)) => Err(err),
                Err(err) => {
                    warn!(
                        folder = %folder.display(),
                        error = %err,
                        "Forced upload failed; processing base directory"
                    );
                    coordinator.run(base).map(TriggerOutcome::Fallback)
                }
            }
        }
    }
}
