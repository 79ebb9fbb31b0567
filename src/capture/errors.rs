use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while walking or reading capture folders.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The provided root path is not a directory.
    #[error("Capture root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    /// Failed to read a file or directory.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to convert filesystem time metadata.
    #[error("Time conversion failed for {path}")]
    Time {
        /// Path whose timestamp could not be converted.
        path: PathBuf,
    },
}
