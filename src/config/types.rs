use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Complete runtime configuration, passed by reference into each component.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote store location, credentials and device identity.
    pub remote: RemoteSettings,
    /// Batch sizing, retry bound and tracking store location.
    pub sync: SyncSettings,
    /// Folder readiness polling.
    pub readiness: ReadinessSettings,
    /// Which files make up a capture folder.
    pub payload: PayloadSettings,
}

/// Identity attached to every uploaded record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeviceIdentity {
    /// Identifier used as half of the remote upsert key.
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_device_type", rename = "type")]
    pub kind: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: default_device_name(),
            kind: default_device_type(),
        }
    }
}

/// Remote store settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteSettings {
    /// Base URL of the remote REST service.
    #[serde(default)]
    pub url: String,
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,
    /// Table receiving one record per folder.
    #[serde(default = "default_table")]
    pub table: String,
    /// Object bucket receiving image bytes.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Value of the `data_type` column on uploaded records.
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub device: DeviceIdentity,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
            bucket: default_bucket(),
            data_type: default_data_type(),
            device: DeviceIdentity::default(),
        }
    }
}

impl RemoteSettings {
    /// Names of required settings that are still empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("remote.url");
        }
        if self.api_key.trim().is_empty() {
            missing.push("remote.api_key");
        }
        if self.device.id.trim().is_empty() {
            missing.push("remote.device.id");
        }
        missing
    }
}

/// Coordinator tuning and tracking store location.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// Number of folders per chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts allowed per folder before it stops being eligible.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between chunks.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Pause between forced attempts when waiting and retrying.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Tracking store file; defaults to one inside the app directory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            batch_delay_ms: default_batch_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            store_path: None,
        }
    }
}

impl SyncSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Folder readiness polling settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadinessSettings {
    /// Overall deadline for a folder to become ready.
    #[serde(default = "default_readiness_timeout_secs")]
    pub timeout_secs: u64,
    /// How long a folder must stay unchanged.
    #[serde(default = "default_stable_secs")]
    pub stable_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// File name (or `*.ext` pattern) that marks a finished capture.
    #[serde(default = "default_descriptor_name")]
    pub marker: String,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_readiness_timeout_secs(),
            stable_secs: default_stable_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            marker: default_descriptor_name(),
        }
    }
}

impl ReadinessSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stable_for(&self) -> Duration {
        Duration::from_secs(self.stable_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Files that make up a capture folder and the sidecars written back into it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PayloadSettings {
    /// Lowercase image extensions without the leading dot.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Name of the JSON result descriptor.
    #[serde(default = "default_descriptor_name")]
    pub descriptor_name: String,
    #[serde(default = "default_success_file")]
    pub success_file: String,
    #[serde(default = "default_failed_file")]
    pub failed_file: String,
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            descriptor_name: default_descriptor_name(),
            success_file: default_success_file(),
            failed_file: default_failed_file(),
        }
    }
}

impl PayloadSettings {
    /// True when the file name carries one of the configured image extensions.
    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.image_extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// True when the file is the result descriptor.
    pub fn is_descriptor(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == self.descriptor_name)
    }

    /// True when the file is a sidecar written by this tool.
    pub fn is_sidecar(&self, name: &str) -> bool {
        name == self.success_file || name == self.failed_file
    }

    /// Sidecar names, excluded from fingerprints.
    pub fn sidecar_names(&self) -> [&str; 2] {
        [self.success_file.as_str(), self.failed_file.as_str()]
    }
}
