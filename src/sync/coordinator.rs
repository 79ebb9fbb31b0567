use std::path::Path;
use std::thread;

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};

use crate::capture::{discover_capture_folders, fingerprint, folder_name};
use crate::config::{PayloadSettings, SyncConfig};
use crate::remote::RemoteStore;
use crate::tracking::{BatchStatus, FolderStatus, TrackingError, TrackingStore};

use super::sidecar::{SidecarReport, write_sidecar};
use super::upload::upload_folder;
use super::{PROGRESS_INTERVAL, RunSummary, SyncError};

/// Result of recording a base directory in the tracking store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub folders: usize,
}

/// Walk `base` and upsert every capture folder found below it.
pub fn scan_folders(
    store: &TrackingStore,
    base: &Path,
    payload: &PayloadSettings,
) -> Result<ScanSummary, SyncError> {
    if !base.is_dir() {
        return Err(SyncError::InvalidBasePath(base.to_path_buf()));
    }
    let folders = discover_capture_folders(base, payload)?;
    let excluded = payload.sidecar_names();
    info!(base = %base.display(), folders = folders.len(), "Scanning capture folders");
    for (index, folder) in folders.iter().enumerate() {
        let digest = fingerprint(&folder.path, &excluded);
        store.upsert_folder(
            &folder.path,
            &folder_name(&folder.path),
            folder.file_count,
            &digest,
        )?;
        let scanned = index + 1;
        if scanned % PROGRESS_INTERVAL == 0 {
            info!(scanned, total = folders.len(), "Scan progress");
        }
    }
    Ok(ScanSummary {
        folders: folders.len(),
    })
}

/// Drives one upload run over a base directory.
pub struct Coordinator<'a> {
    store: &'a TrackingStore,
    remote: &'a dyn RemoteStore,
    config: &'a SyncConfig,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        store: &'a TrackingStore,
        remote: &'a dyn RemoteStore,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        self.config
    }

    pub fn store(&self) -> &TrackingStore {
        self.store
    }

    /// Scan `base`, then upload every eligible folder below it in chunks.
    ///
    /// No batch is created when nothing is eligible.
    pub fn run(&self, base: &Path) -> Result<RunSummary, SyncError> {
        scan_folders(self.store, base, &self.config.payload)?;
        let excluded = self.config.payload.sidecar_names();
        let eligible = self
            .store
            .select_eligible(base, self.config.sync.max_retries, &excluded)?;
        if eligible.is_empty() {
            info!(base = %base.display(), "No folders to process");
            return Ok(RunSummary::default());
        }

        let total = eligible.len() as u64;
        let batch_id = self.store.create_batch(&batch_name(), total)?;
        let chunk_size = self.config.sync.batch_size.max(1);
        let chunk_count = eligible.len().div_ceil(chunk_size);
        info!(batch = %batch_id, folders = total, chunks = chunk_count, "Processing folders");

        let mut summary = RunSummary {
            total,
            batch_id: Some(batch_id.clone()),
            ..RunSummary::default()
        };
        for (index, chunk) in eligible.chunks(chunk_size).enumerate() {
            let (mut successful, mut failed) = (0u64, 0u64);
            for folder in chunk {
                let path = &folder.record.path;
                if self.process_folder(path, &folder.current_fingerprint, &batch_id)? {
                    successful += 1;
                } else {
                    failed += 1;
                }
            }
            self.store.update_batch(&batch_id, successful, failed, None)?;
            summary.successful += successful;
            summary.failed += failed;
            info!(
                chunk = index + 1,
                chunks = chunk_count,
                successful,
                failed,
                "Chunk completed"
            );
            let delay = self.config.sync.batch_delay();
            if index + 1 < chunk_count && !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        self.store.update_batch(
            &batch_id,
            summary.successful,
            summary.failed,
            Some(BatchStatus::Completed),
        )?;
        info!(
            batch = %batch_id,
            successful = summary.successful,
            failed = summary.failed,
            "Batch completed"
        );
        Ok(summary)
    }

    /// Upload one folder, record its status and write its sidecar.
    ///
    /// Returns whether the upload succeeded. Only tracking store failures are errors.
    pub(crate) fn process_folder(
        &self,
        folder: &Path,
        fingerprint: &str,
        batch_id: &str,
    ) -> Result<bool, TrackingError> {
        match upload_folder(self.remote, self.config, folder, fingerprint, batch_id) {
            Ok(upload) => {
                self.store.mark_status(folder, FolderStatus::Success, None)?;
                let report = upload.into_report(batch_id, self.config);
                self.write_report(folder, &report);
                Ok(true)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(folder = %folder.display(), error = %message, "Folder upload failed");
                self.store
                    .mark_status(folder, FolderStatus::Failed, Some(&message))?;
                let mut report =
                    SidecarReport::new(&folder_name(folder), batch_id, &self.config.remote.device);
                report.status = FolderStatus::Failed.as_str().to_string();
                report.error = Some(message);
                self.write_report(folder, &report);
                Ok(false)
            }
        }
    }

    fn write_report(&self, folder: &Path, report: &SidecarReport) {
        if let Err(err) = write_sidecar(folder, &self.config.payload, report) {
            warn!(folder = %folder.display(), error = %err, "Could not write sidecar");
        }
    }
}

/// Human-readable batch name from the local start time.
fn batch_name() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "batch_[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| format!("batch_{}", now.unix_timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::read_sidecar;
    use crate::sync::test_support::{FakeRemote, capture_folder, test_config};
    use crate::remote::TestStatus;
    use tempfile::tempdir;

    #[test]
    fn empty_base_creates_no_batch() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        std::fs::create_dir(&base).unwrap();
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();

        let summary = Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(store.status_report(10).unwrap().recent_batches.is_empty());
    }

    #[test]
    fn invalid_base_is_rejected_before_scanning() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();
        let err = Coordinator::new(&store, &remote, &config)
            .run(&dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidBasePath(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn chunks_update_batch_and_complete_with_totals() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        for name in ["A", "B", "C"] {
            capture_folder(&base, name, &[("img.png", b"png")]);
        }
        let mut config = test_config(&dir.path().join("track.db"));
        config.sync.batch_size = 2;
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();
        remote.fail_records("B", 1);

        let summary = Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);

        let batch = store
            .get_batch(summary.batch_id.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(batch.total_folders, 3);
        assert_eq!((batch.successful, batch.failed), (2, 1));
        assert_eq!(batch.status, Some(BatchStatus::Completed));
        assert!(batch.ended_at_ms.is_some());
        assert!(batch.name.starts_with("batch_"));
    }

    #[test]
    fn failure_is_recorded_in_store_and_sidecar() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        let folder = capture_folder(&base, "Broken", &[("a.jpg", b"jpg")]);
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();
        remote.fail_records("Broken", 1);

        Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        let record = store.get_folder(&folder).unwrap().unwrap();
        assert_eq!(record.status, Some(FolderStatus::Failed));
        assert_eq!(record.retry_count, 1);
        assert!(record.error_message.unwrap().contains("500"));

        let sidecar = read_sidecar(&folder.join("failed.json")).unwrap();
        assert_eq!(sidecar.status, "failed");
        assert!(sidecar.error.is_some());
        assert!(!folder.join("success.json").exists());
    }

    #[test]
    fn successful_folder_is_skipped_next_run() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        let folder = capture_folder(
            &base,
            "Done",
            &[("a.jpg", b"jpg"), ("stats.json", br#"{"result": [1]}"#)],
        );
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();

        let first = Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        assert_eq!(first.successful, 1);
        let second = Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        assert!(second.is_empty());

        let sidecar = read_sidecar(&folder.join("success.json")).unwrap();
        assert_eq!(sidecar.test_status, Some(TestStatus::Passed));
        assert_eq!(remote.records.borrow().len(), 1);
    }

    #[test]
    fn image_failure_does_not_fail_folder() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        let folder = capture_folder(&base, "Partial", &[("a.png", b"1"), ("b.png", b"2")]);
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();
        remote.fail_image("b.png");

        let summary = Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        assert_eq!(summary.successful, 1);
        let record = remote.record_for("Partial").unwrap();
        assert_eq!(record.images.len(), 2);
        assert!(record.images[0].starts_with("https://remote.test/images/dev-1/Partial/"));
        assert_eq!(record.images[1], "b.png");
        let sidecar = read_sidecar(&folder.join("success.json")).unwrap();
        assert_eq!(sidecar.failed_files.len(), 1);
        assert_eq!(sidecar.failed_files[0].file, "b.png");
    }

    #[test]
    fn unreadable_descriptor_uploads_without_results() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("captures");
        capture_folder(&base, "BadJson", &[("a.png", b"1"), ("stats.json", b"{not json")]);
        let config = test_config(&dir.path().join("track.db"));
        let store = TrackingStore::open(dir.path().join("track.db")).unwrap();
        let remote = FakeRemote::default();

        Coordinator::new(&store, &remote, &config).run(&base).unwrap();
        let record = remote.record_for("BadJson").unwrap();
        assert!(record.test_results.is_none());
        assert_eq!(record.test_status, TestStatus::Pending);
        assert_eq!(record.metadata.files_processed, vec!["a.png", "stats.json"]);
    }
}
