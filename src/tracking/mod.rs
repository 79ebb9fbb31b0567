//! Durable upload tracking backed by SQLite.
//!
//! One row per capture folder records its fingerprint and upload status; one
//! row per coordinator run records batch totals. Eligibility for the next run
//! is derived from these rows.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod eligible;
mod read;
mod schema;
mod util;
mod write;

pub use eligible::EligibleFolder;
pub use read::StatusReport;

/// Batches shown by the status report when no count is given.
pub const DEFAULT_RECENT_BATCHES: usize = 10;

/// Upload status of a tracked folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderStatus {
    Pending,
    Success,
    Failed,
}

impl FolderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored value; unknown labels read as missing.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Lifecycle of a coordinator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Tracked state of one capture folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub path: PathBuf,
    pub name: String,
    /// Directory modification time in epoch nanoseconds.
    pub last_modified_ns: i64,
    pub file_count: u64,
    /// Metadata fingerprint; empty means it could not be computed.
    pub fingerprint: String,
    /// `None` when the stored status is absent or unrecognized.
    pub status: Option<FolderStatus>,
    /// Incremented by every status update, successful ones included.
    pub retry_count: u32,
    pub error_message: Option<String>,
    /// Epoch milliseconds of the last status update.
    pub status_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Totals for one coordinator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: String,
    pub name: String,
    pub total_folders: u64,
    pub successful: u64,
    pub failed: u64,
    pub started_at_ms: i64,
    pub ended_at_ms: Option<i64>,
    pub status: Option<BatchStatus>,
}

/// Errors returned by the tracking store.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// SQLite query failed.
    #[error("Tracking store query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to create the directory holding the store.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        /// Path that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Database is locked or busy.
    #[error("Tracking store is busy, please retry")]
    Busy,
    /// A batch update referenced an id that does not exist.
    #[error("Unknown batch id: {0}")]
    UnknownBatch(String),
    /// Could not allocate a unique batch id.
    #[error("Could not allocate a unique batch id for {0}")]
    BatchIdExhausted(String),
}

/// SQLite wrapper holding folder and batch tracking rows.
pub struct TrackingStore {
    connection: Connection,
    path: PathBuf,
}

impl TrackingStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrackingError> {
        let path = path.as_ref();
        util::create_parent_if_needed(path)?;
        let connection = Connection::open(path).map_err(util::map_sql_error)?;
        let store = Self {
            connection,
            path: path.to_path_buf(),
        };
        store.apply_pragmas()?;
        schema::apply_schema(&store.connection)?;
        Ok(store)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn apply_pragmas(&self) -> Result<(), TrackingError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
            )
            .map_err(util::map_sql_error)
    }
}
