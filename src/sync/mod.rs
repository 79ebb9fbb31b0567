//! Batch coordination: scan, select, upload, record.
//!
//! A run walks the base directory, records every capture folder in the
//! tracking store, picks the folders still needing upload and pushes them to
//! the remote store in chunks. Each folder ends with a tracked status and a
//! sidecar file. Only tracking store failures abort a run.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app_dirs::AppDirError;
use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::tracking::TrackingError;
use crate::watch::WatchError;

mod coordinator;
mod run_lock;
mod sidecar;
mod trigger;
mod upload;

pub use coordinator::{Coordinator, ScanSummary, scan_folders};
pub use run_lock::{RunLock, RunLockError};
pub use sidecar::{
    FailedFile, SidecarError, SidecarReport, UPLOAD_METHOD, read_sidecar, write_sidecar,
};
pub use trigger::{
    ForceOptions, TriggerMode, TriggerOutcome, force_upload, handle_created_folder,
    run_marker_gated,
};
pub use upload::{FolderUpload, FolderUploadError, upload_folder};

/// Folders between progress log lines while scanning.
pub const PROGRESS_INTERVAL: usize = 100;

/// Errors that stop a run or a CLI command.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Base path is not a directory: {0}")]
    InvalidBasePath(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Lock(#[from] RunLockError),
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("Forced upload of {folder} failed: {reason}")]
    ForcedUploadFailed { folder: PathBuf, reason: String },
}

impl SyncError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidBasePath(_) | Self::Config(_) => 2,
            Self::Remote(RemoteError::InvalidUrl { .. }) => 2,
            Self::Capture(CaptureError::InvalidRoot(_)) => 2,
            _ => 1,
        }
    }
}

/// Outcome of one coordinator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub successful: u64,
    pub failed: u64,
    pub total: u64,
    /// `None` when nothing was eligible and no batch was created.
    pub batch_id: Option<String>,
}

impl RunSummary {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

pub(crate) fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub(crate) fn now_epoch_secs() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
pub(crate) mod test_support;
