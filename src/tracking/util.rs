use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::TrackingError;

/// Translate rusqlite errors into friendlier TrackingError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> TrackingError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.code == rusqlite::ErrorCode::DatabaseBusy =>
        {
            TrackingError::Busy
        }
        other => TrackingError::Sql(other),
    }
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), TrackingError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| TrackingError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub(super) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Stored-path prefix that matches `prefix` itself or anything below it.
pub(super) fn descendant_prefix(prefix: &str) -> String {
    let sep = std::path::MAIN_SEPARATOR;
    if prefix.ends_with(sep) || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}{sep}")
    }
}

pub(super) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

/// Batch id of the form `batch_<epoch seconds>_<4 hex chars>`.
///
/// The suffix hashes the batch name with the current nanos, process id and
/// attempt number so concurrent runs in the same second do not collide.
pub(super) fn batch_id(name: &str, attempt: u32) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&now.as_nanos().to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&attempt.to_le_bytes());
    let digest = hasher.finalize().to_hex();
    format!("batch_{}_{}", now.as_secs(), &digest.as_str()[..4])
}
