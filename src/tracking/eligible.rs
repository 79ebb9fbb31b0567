use std::path::Path;

use rusqlite::params;
use tracing::debug;

use crate::capture::{dir_modified_ns, fingerprint};

use super::read::{FOLDER_COLUMNS, folder_from_row};
use super::util::{descendant_prefix, map_sql_error, path_key};
use super::{FolderRecord, TrackingError, TrackingStore};

/// A folder selected for upload, with its freshly recomputed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleFolder {
    pub record: FolderRecord,
    pub current_fingerprint: String,
    pub current_modified_ns: i64,
}

impl TrackingStore {
    /// Folders at or below `prefix` that still need uploading.
    ///
    /// A folder qualifies when its status is pending, failed or missing and it
    /// has been attempted fewer than `max_retries` times. Results are ordered
    /// oldest first by modification time. Folders no longer on disk are
    /// skipped. `fingerprint_excludes` names the sidecar files left out of the
    /// recomputed fingerprint.
    pub fn select_eligible(
        &self,
        prefix: &Path,
        max_retries: u32,
        fingerprint_excludes: &[&str],
    ) -> Result<Vec<EligibleFolder>, TrackingError> {
        let exact = path_key(prefix);
        let below = descendant_prefix(&exact);
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folder_status
             WHERE (folder_path = ?1 OR substr(folder_path, 1, length(?2)) = ?2)
               AND (upload_status IS NULL OR upload_status <> 'success')
               AND retry_count < ?3
             ORDER BY last_modified ASC, folder_path ASC"
        );
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let records = stmt
            .query_map(params![exact, below, max_retries as i64], folder_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;

        let mut eligible = Vec::with_capacity(records.len());
        for record in records {
            if !record.path.is_dir() {
                debug!(
                    folder = %record.path.display(),
                    "Tracked folder no longer exists; skipping"
                );
                continue;
            }
            let current_fingerprint = fingerprint(&record.path, fingerprint_excludes);
            let current_modified_ns = dir_modified_ns(&record.path);
            eligible.push(EligibleFolder {
                record,
                current_fingerprint,
                current_modified_ns,
            });
        }
        Ok(eligible)
    }
}
