use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::config::PayloadSettings;

use super::CaptureError;
use super::fs_facts::is_hidden;

/// A directory that directly holds at least one payload file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFolder {
    pub path: PathBuf,
    /// Regular files directly inside the folder.
    pub file_count: u64,
}

/// Walk `root` and return every capture folder below it, including `root` itself.
///
/// Hidden directories and symlinks are skipped. Unreadable subdirectories are
/// logged and skipped; an unreadable root is an error. Results are sorted by path.
pub fn discover_capture_folders(
    root: &Path,
    payload: &PayloadSettings,
) -> Result<Vec<DiscoveredFolder>, CaptureError> {
    if !root.is_dir() {
        return Err(CaptureError::InvalidRoot(root.to_path_buf()));
    }
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if dir != root => {
                warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Failed to read directory during discovery"
                );
                continue;
            }
            Err(source) => {
                return Err(CaptureError::Io {
                    path: dir.clone(),
                    source,
                });
            }
        };
        let mut file_count = 0u64;
        let mut has_payload = false;
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                warn!(path = %path.display(), "Failed to read file type during discovery");
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                if !is_hidden(&path) {
                    stack.push(path);
                }
                continue;
            }
            if file_type.is_file() {
                file_count += 1;
                has_payload |= payload.is_image(&path) || payload.is_descriptor(&path);
            }
        }
        if has_payload {
            found.push(DiscoveredFolder {
                path: dir,
                file_count,
            });
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

/// Count regular files directly inside `folder`, or 0 when unreadable.
pub fn count_files(folder: &Path) -> u64 {
    fs::read_dir(folder)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_file()))
                .count() as u64
        })
        .unwrap_or(0)
}
