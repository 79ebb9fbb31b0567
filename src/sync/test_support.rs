use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{RemoteSettings, SyncConfig};
use crate::remote::{RemoteError, RemoteStore, UploadRecord};

/// In-memory remote that records calls and fails on request.
#[derive(Default)]
pub(crate) struct FakeRemote {
    pub records: RefCell<Vec<UploadRecord>>,
    pub objects: RefCell<Vec<String>>,
    /// Folder name to number of record upserts that should still fail.
    pub record_failures: RefCell<HashMap<String, u32>>,
    pub failing_images: RefCell<HashSet<String>>,
}

impl FakeRemote {
    pub fn fail_records(&self, folder: &str, times: u32) {
        self.record_failures
            .borrow_mut()
            .insert(folder.to_string(), times);
    }

    pub fn fail_image(&self, name: &str) {
        self.failing_images.borrow_mut().insert(name.to_string());
    }

    pub fn record_for(&self, folder: &str) -> Option<UploadRecord> {
        self.records
            .borrow()
            .iter()
            .rev()
            .find(|record| record.folder_name == folder)
            .cloned()
    }
}

impl RemoteStore for FakeRemote {
    fn ensure_bucket(&self, _bucket: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    fn upload_object(
        &self,
        bucket: &str,
        segments: &[&str],
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RemoteError> {
        let name = segments.last().copied().unwrap_or_default();
        if self.failing_images.borrow().contains(name) {
            return Err(RemoteError::Status {
                code: 400,
                body: "rejected".into(),
            });
        }
        let url = format!("https://remote.test/{bucket}/{}", segments.join("/"));
        self.objects.borrow_mut().push(url.clone());
        Ok(url)
    }

    fn upsert_record(&self, _table: &str, record: &UploadRecord) -> Result<(), RemoteError> {
        if let Some(remaining) = self
            .record_failures
            .borrow_mut()
            .get_mut(&record.folder_name)
            .filter(|remaining| **remaining > 0)
        {
            *remaining -= 1;
            return Err(RemoteError::Status {
                code: 500,
                body: "upstream unavailable".into(),
            });
        }
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}

pub(crate) fn test_config(store: &Path) -> SyncConfig {
    let mut config = SyncConfig {
        remote: RemoteSettings {
            url: "https://remote.test".into(),
            api_key: "key".into(),
            ..RemoteSettings::default()
        },
        ..SyncConfig::default()
    };
    config.remote.device.id = "dev-1".into();
    config.sync.batch_delay_ms = 0;
    config.sync.retry_delay_ms = 0;
    config.sync.store_path = Some(store.to_path_buf());
    config.readiness.stable_secs = 0;
    config.readiness.timeout_secs = 2;
    config.readiness.poll_interval_ms = 20;
    config
}

/// Create `root/name` holding the given files.
pub(crate) fn capture_folder(root: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let folder = root.join(name);
    std::fs::create_dir_all(&folder).unwrap();
    for (file, bytes) in files {
        std::fs::write(folder.join(file), bytes).unwrap();
    }
    folder
}
