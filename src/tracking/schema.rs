use rusqlite::Connection;

use super::TrackingError;
use super::util::map_sql_error;

pub(super) fn apply_schema(connection: &Connection) -> Result<(), TrackingError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS folder_status (
                folder_path TEXT PRIMARY KEY,
                folder_name TEXT NOT NULL,
                last_modified INTEGER NOT NULL DEFAULT 0,
                file_count INTEGER NOT NULL DEFAULT 0,
                file_hash TEXT NOT NULL DEFAULT '',
                upload_status TEXT DEFAULT 'pending',
                upload_timestamp INTEGER,
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_folder_status_status
                ON folder_status (upload_status);
             CREATE INDEX IF NOT EXISTS idx_folder_status_modified
                ON folder_status (last_modified);
             CREATE TABLE IF NOT EXISTS upload_batches (
                batch_id TEXT PRIMARY KEY,
                batch_name TEXT NOT NULL,
                total_folders INTEGER NOT NULL,
                successful_uploads INTEGER NOT NULL DEFAULT 0,
                failed_uploads INTEGER NOT NULL DEFAULT 0,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT NOT NULL DEFAULT 'running',
                created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_upload_batches_start
                ON upload_batches (start_time);",
        )
        .map_err(map_sql_error)
}
