use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use super::CaptureError;

/// Size and modification time of one file, relative to the folder being described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileFacts {
    pub(crate) relative: String,
    pub(crate) size: u64,
    pub(crate) modified_ns: i64,
}

pub(crate) fn read_facts(root: &Path, path: &Path) -> Result<FileFacts, CaptureError> {
    let relative = strip_relative(root, path)?;
    let meta = path.symlink_metadata().map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = meta.modified().map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FileFacts {
        relative: relative_key(&relative),
        size: meta.len(),
        modified_ns: to_nanos(&modified, path)?,
    })
}

/// Directory modification time in epoch nanoseconds, or 0 when unreadable.
pub fn dir_modified_ns(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| to_nanos(&time, path).ok())
        .unwrap_or(0)
}

pub(crate) fn to_nanos(time: &SystemTime, path: &Path) -> Result<i64, CaptureError> {
    let duration = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CaptureError::Time {
            path: path.to_path_buf(),
        })?;
    Ok(duration.as_nanos().min(i64::MAX as u128) as i64)
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Final path component as text, falling back to the full path.
pub fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn strip_relative(root: &Path, path: &Path) -> Result<PathBuf, CaptureError> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Ok(PathBuf::from(relative));
    }
    if let (Ok(canon_root), Ok(canon_path)) = (root.canonicalize(), path.canonicalize())
        && let Ok(relative) = canon_path.strip_prefix(&canon_root)
    {
        return Ok(PathBuf::from(relative));
    }
    Err(CaptureError::InvalidRoot(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn facts_use_forward_slash_relative_paths() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("sub").join("inner");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("a.png");
        fs::write(&file, b"abc").unwrap();

        let facts = read_facts(dir.path(), &file).unwrap();
        assert_eq!(facts.relative, "sub/inner/a.png");
        assert_eq!(facts.size, 3);
        assert!(facts.modified_ns > 0);
    }

    #[test]
    fn hidden_detection_uses_final_component() {
        assert!(is_hidden(Path::new("/data/.staging")));
        assert!(!is_hidden(Path::new("/data/.staging/run1")));
    }

    #[test]
    fn missing_dir_reports_zero_modified_time() {
        let dir = tempdir().unwrap();
        assert_eq!(dir_modified_ns(&dir.path().join("gone")), 0);
        assert!(dir_modified_ns(dir.path()) > 0);
    }
}
