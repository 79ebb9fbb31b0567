//! Remote store seam: record upserts, image uploads and bucket setup.

use std::path::PathBuf;

mod record;
mod rest;

pub use record::{TestStatus, UploadMetadata, UploadRecord};
pub use rest::RestRemote;

/// Errors returned by a remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Transport(String),
    /// The configured base URL cannot be used.
    #[error("Invalid remote URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// A local file could not be read for upload.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Transport failures, throttling and server errors are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => *code == 429 || (500..=599).contains(code),
            _ => false,
        }
    }
}

/// Operations the coordinator needs from the remote store.
pub trait RemoteStore {
    /// Create `bucket` if needed. An existing bucket counts as success.
    fn ensure_bucket(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Store `bytes` at `segments` inside `bucket` and return the public URL.
    ///
    /// Segments are joined with `/` after percent-encoding each one.
    fn upload_object(
        &self,
        bucket: &str,
        segments: &[&str],
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError>;

    /// Insert or merge `record` into `table`, keyed on folder name and device id.
    fn upsert_record(&self, table: &str, record: &UploadRecord) -> Result<(), RemoteError>;
}

/// Best-effort MIME type for an image file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
