use std::path::{Path, PathBuf};

use capsync::config::SyncConfig;
use capsync::tracking::TrackingStore;
use tempfile::TempDir;

/// Temp workspace with a capture base directory and a tracking store.
pub struct Workspace {
    pub temp: TempDir,
    pub base: PathBuf,
    pub store_path: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("create tempdir");
        let base = temp.path().join("data");
        std::fs::create_dir_all(&base).expect("create base dir");
        let base = base.canonicalize().expect("canonicalize base dir");
        let store_path = temp.path().join("upload_tracking.db");
        Self {
            temp,
            base,
            store_path,
        }
    }

    pub fn store(&self) -> TrackingStore {
        TrackingStore::open(&self.store_path).expect("open tracking store")
    }

    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.remote.url = "https://remote.test".into();
        config.remote.api_key = "test-key".into();
        config.remote.device.id = "station-7".into();
        config.sync.batch_delay_ms = 0;
        config.sync.retry_delay_ms = 0;
        config.sync.store_path = Some(self.store_path.clone());
        config.readiness.stable_secs = 0;
        config.readiness.poll_interval_ms = 20;
        config.readiness.timeout_secs = 2;
        config
    }

    /// Create a capture folder under the base directory.
    pub fn folder(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        write_folder(&self.base.join(name), files)
    }
}

pub fn write_folder(folder: &Path, files: &[(&str, &[u8])]) -> PathBuf {
    std::fs::create_dir_all(folder).expect("create capture folder");
    for (name, bytes) in files {
        std::fs::write(folder.join(name), bytes).expect("write capture file");
    }
    folder.to_path_buf()
}

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";
pub const JPG: &[u8] = b"\xff\xd8\xff\xe0fake";
