use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

use super::util::{map_sql_error, path_key};
use super::{BatchRecord, BatchStatus, FolderRecord, FolderStatus, TrackingError, TrackingStore};

/// Label used in reports for folders without a recognized status.
pub const MISSING_STATUS_LABEL: &str = "missing";

pub(super) const FOLDER_COLUMNS: &str = "folder_path, folder_name, last_modified, file_count,
     file_hash, upload_status, retry_count, error_message, upload_timestamp, created_at,
     updated_at";

const BATCH_COLUMNS: &str = "batch_id, batch_name, total_folders, successful_uploads,
     failed_uploads, start_time, end_time, status";

/// Folder counts by status and the most recent batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Folder count per status label; unrecognized statuses count as `missing`.
    pub status_counts: BTreeMap<String, u64>,
    pub total_folders: u64,
    /// Newest first.
    pub recent_batches: Vec<BatchRecord>,
}

impl StatusReport {
    pub fn count(&self, status: FolderStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}

impl TrackingStore {
    /// Fetch a folder record; `Ok(None)` when the path is not tracked.
    pub fn get_folder(&self, path: &Path) -> Result<Option<FolderRecord>, TrackingError> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folder_status WHERE folder_path = ?1");
        self.connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?
            .query_row(params![path_key(path)], folder_from_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Every tracked folder ordered by path.
    pub fn list_folders(&self) -> Result<Vec<FolderRecord>, TrackingError> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folder_status ORDER BY folder_path ASC");
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], folder_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Fetch a batch record; `Ok(None)` when unknown.
    pub fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>, TrackingError> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM upload_batches WHERE batch_id = ?1");
        self.connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?
            .query_row(params![batch_id], batch_from_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Per-status folder counts plus the `recent` newest batches.
    pub fn status_report(&self, recent: usize) -> Result<StatusReport, TrackingError> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT upload_status, COUNT(*) FROM folder_status GROUP BY upload_status",
            )
            .map_err(map_sql_error)?;
        let grouped = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;

        let mut status_counts = BTreeMap::new();
        for (status, count) in grouped {
            let label = status
                .as_deref()
                .and_then(FolderStatus::parse)
                .map(|status| status.as_str())
                .unwrap_or(MISSING_STATUS_LABEL);
            *status_counts.entry(label.to_string()).or_insert(0) += count.max(0) as u64;
        }
        let total_folders = status_counts.values().sum();

        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM upload_batches
             ORDER BY start_time DESC, rowid DESC LIMIT ?1"
        );
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let recent_batches = stmt
            .query_map(params![recent as i64], batch_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;

        Ok(StatusReport {
            status_counts,
            total_folders,
            recent_batches,
        })
    }
}

pub(super) fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<FolderRecord> {
    let path: String = row.get(0)?;
    Ok(FolderRecord {
        path: PathBuf::from(path),
        name: row.get(1)?,
        last_modified_ns: row.get(2)?,
        file_count: row.get::<_, i64>(3)?.max(0) as u64,
        fingerprint: row.get(4)?,
        status: row
            .get::<_, Option<String>>(5)?
            .as_deref()
            .and_then(FolderStatus::parse),
        retry_count: row.get::<_, i64>(6)?.clamp(0, u32::MAX as i64) as u32,
        error_message: row.get(7)?,
        status_at_ms: row.get(8)?,
        created_at_ms: row.get(9)?,
        updated_at_ms: row.get(10)?,
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    Ok(BatchRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        total_folders: row.get::<_, i64>(2)?.max(0) as u64,
        successful: row.get::<_, i64>(3)?.max(0) as u64,
        failed: row.get::<_, i64>(4)?.max(0) as u64,
        started_at_ms: row.get(5)?,
        ended_at_ms: row.get(6)?,
        status: row.get::<_, String>(7).ok().as_deref().and_then(BatchStatus::parse),
    })
}
