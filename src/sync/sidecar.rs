//! Folder-local outcome files (`success.json` / `failed.json`).
//!
//! The sidecar is the last known result for a folder, readable without the
//! tracking store. Writing one removes the opposite file so only the latest
//! outcome remains.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DeviceIdentity, PayloadSettings};
use crate::remote::TestStatus;

/// Value of the `method` field in every sidecar.
pub const UPLOAD_METHOD: &str = "rest_api";

/// A file that could not be uploaded or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Contents of a sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarReport {
    pub timestamp: String,
    pub folder: String,
    /// `success` or `failed`.
    pub status: String,
    pub method: String,
    /// Label sent with the remote record, when an upload was attempted.
    pub upload_batch: Option<String>,
    /// Tracking batch this attempt belonged to.
    pub batch_id: String,
    pub test_status: Option<TestStatus>,
    pub uploaded_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
    pub image_urls: Vec<String>,
    pub error: Option<String>,
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
}

impl SidecarReport {
    pub(crate) fn new(folder: &str, batch_id: &str, device: &DeviceIdentity) -> Self {
        Self {
            timestamp: super::now_rfc3339(),
            folder: folder.to_string(),
            status: String::new(),
            method: UPLOAD_METHOD.to_string(),
            upload_batch: None,
            batch_id: batch_id.to_string(),
            test_status: None,
            uploaded_files: Vec::new(),
            failed_files: Vec::new(),
            image_urls: Vec::new(),
            error: None,
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            device_type: device.kind.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Errors while writing a sidecar. Callers log these and carry on.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("Failed to serialize sidecar for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write `report` into `folder` and remove the opposite sidecar.
///
/// Returns the path written.
pub fn write_sidecar(
    folder: &Path,
    payload: &PayloadSettings,
    report: &SidecarReport,
) -> Result<PathBuf, SidecarError> {
    let (name, stale) = if report.is_success() {
        (&payload.success_file, &payload.failed_file)
    } else {
        (&payload.failed_file, &payload.success_file)
    };
    let path = folder.join(name);
    let data = serde_json::to_vec_pretty(report).map_err(|source| SidecarError::Serialize {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, &data)?;
    let stale = folder.join(stale);
    match std::fs::remove_file(&stale) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => return Err(SidecarError::Write { path: stale, source }),
    }
    Ok(path)
}

/// Read a sidecar back, if present and parseable.
pub fn read_sidecar(path: &Path) -> Option<SidecarReport> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), SidecarError> {
    use rand::TryRngCore;
    let write_err = |path: &Path, source: std::io::Error| SidecarError::Write {
        path: path.to_path_buf(),
        source,
    };
    let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Err(write_err(
            path,
            std::io::Error::other("sidecar path has no parent directory"),
        ));
    };

    let mut last_err = None;
    for _ in 0..5 {
        let mut bytes = [0u8; 6];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|source| {
                let message = format!("failed to generate temporary file suffix: {source}");
                write_err(path, std::io::Error::other(message))
            })?;
        let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let tmp_path = dir.join(format!(".{}.tmp-{}", file_name.to_string_lossy(), suffix));

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(write_err(&tmp_path, err)),
        };
        if let Err(err) = file.write_all(data).and_then(|()| file.sync_all()) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_err(&tmp_path, err));
        }
        drop(file);
        if let Err(err) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_err(path, err));
        }
        return Ok(());
    }
    Err(write_err(
        path,
        last_err.unwrap_or_else(|| std::io::Error::other("failed to create temporary file")),
    ))
}
