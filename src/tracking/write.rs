use std::path::Path;

use rusqlite::{ErrorCode, params};
use tracing::{debug, warn};

use crate::capture::dir_modified_ns;

use super::util::{batch_id, map_sql_error, now_epoch_ms, path_key};
use super::{BatchStatus, FolderStatus, TrackingError, TrackingStore};

const BATCH_ID_ATTEMPTS: u32 = 5;

impl TrackingStore {
    /// Record a scanned folder.
    ///
    /// New folders start as pending. Known folders get their name, file count,
    /// fingerprint and modified time replaced; their status returns to pending
    /// and their retry count returns to zero only when the fingerprint changed
    /// or either side is empty.
    pub fn upsert_folder(
        &self,
        path: &Path,
        name: &str,
        file_count: u64,
        fingerprint: &str,
    ) -> Result<(), TrackingError> {
        let now = now_epoch_ms();
        let mut stmt = self
            .connection
            .prepare_cached(
                "INSERT INTO folder_status (folder_path, folder_name, last_modified, file_count,
                    file_hash, upload_status, retry_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?6)
                 ON CONFLICT(folder_path) DO UPDATE SET
                    folder_name = excluded.folder_name,
                    last_modified = excluded.last_modified,
                    file_count = excluded.file_count,
                    retry_count = CASE
                        WHEN folder_status.file_hash = ''
                          OR excluded.file_hash = ''
                          OR folder_status.file_hash <> excluded.file_hash THEN 0
                        ELSE folder_status.retry_count
                    END,
                    upload_status = CASE
                        WHEN folder_status.file_hash = ''
                          OR excluded.file_hash = ''
                          OR folder_status.file_hash <> excluded.file_hash THEN 'pending'
                        ELSE folder_status.upload_status
                    END,
                    file_hash = excluded.file_hash,
                    updated_at = excluded.updated_at",
            )
            .map_err(map_sql_error)?;
        stmt.execute(params![
            path_key(path),
            name,
            dir_modified_ns(path),
            file_count as i64,
            fingerprint,
            now
        ])
        .map_err(map_sql_error)?;
        Ok(())
    }

    /// Set a folder's status and bump its retry count.
    ///
    /// The retry count rises on every call, successful outcomes included, until
    /// the next content change resets it. Marking
    /// an untracked path logs a warning and changes nothing.
    pub fn mark_status(
        &self,
        path: &Path,
        status: FolderStatus,
        error_message: Option<&str>,
    ) -> Result<(), TrackingError> {
        let now = now_epoch_ms();
        let changed = self
            .connection
            .prepare_cached(
                "UPDATE folder_status
                 SET upload_status = ?2,
                     error_message = ?3,
                     upload_timestamp = ?4,
                     retry_count = retry_count + 1,
                     updated_at = ?4
                 WHERE folder_path = ?1",
            )
            .map_err(map_sql_error)?
            .execute(params![path_key(path), status.as_str(), error_message, now])
            .map_err(map_sql_error)?;
        if changed == 0 {
            warn!(
                folder = %path.display(),
                status = status.as_str(),
                "Status update for untracked folder ignored"
            );
        }
        Ok(())
    }

    /// Start a batch record and return its unique id.
    pub fn create_batch(&self, name: &str, total_folders: u64) -> Result<String, TrackingError> {
        let now = now_epoch_ms();
        for attempt in 0..BATCH_ID_ATTEMPTS {
            let id = batch_id(name, attempt);
            let result = self
                .connection
                .prepare_cached(
                    "INSERT INTO upload_batches
                        (batch_id, batch_name, total_folders, start_time, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?4)",
                )
                .map_err(map_sql_error)?
                .execute(params![
                    id,
                    name,
                    total_folders as i64,
                    now,
                    BatchStatus::Running.as_str()
                ]);
            match result {
                Ok(_) => {
                    debug!(batch_id = %id, total_folders, "Batch created");
                    return Ok(id);
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    debug!(batch_id = %id, "Batch id collision; regenerating");
                }
                Err(err) => return Err(map_sql_error(err)),
            }
        }
        Err(TrackingError::BatchIdExhausted(name.to_string()))
    }

    /// Update batch counters.
    ///
    /// With `final_status` of [`BatchStatus::Completed`] the counters are
    /// overwritten with the given totals and the end time is stamped; otherwise
    /// the values are added to the stored counters. A batch should use one
    /// style for its running updates and the overwrite only once, at the end.
    pub fn update_batch(
        &self,
        batch_id: &str,
        successful: u64,
        failed: u64,
        final_status: Option<BatchStatus>,
    ) -> Result<(), TrackingError> {
        let changed = match final_status {
            Some(BatchStatus::Completed) => self
                .connection
                .prepare_cached(
                    "UPDATE upload_batches
                     SET successful_uploads = ?2,
                         failed_uploads = ?3,
                         end_time = ?4,
                         status = ?5
                     WHERE batch_id = ?1",
                )
                .map_err(map_sql_error)?
                .execute(params![
                    batch_id,
                    successful as i64,
                    failed as i64,
                    now_epoch_ms(),
                    BatchStatus::Completed.as_str()
                ]),
            Some(BatchStatus::Running) | None => self
                .connection
                .prepare_cached(
                    "UPDATE upload_batches
                     SET successful_uploads = successful_uploads + ?2,
                         failed_uploads = failed_uploads + ?3
                     WHERE batch_id = ?1",
                )
                .map_err(map_sql_error)?
                .execute(params![batch_id, successful as i64, failed as i64]),
        }
        .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(TrackingError::UnknownBatch(batch_id.to_string()));
        }
        Ok(())
    }
}
