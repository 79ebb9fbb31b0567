//! Metadata fingerprint of a capture folder.
//!
//! The digest covers every regular file below the folder as a
//! `(relative path, modified ns, size)` tuple. Tuples are sorted by path before
//! hashing, so enumeration order never affects the result. File bytes are not
//! read: a same-size edit that keeps the modification time is not detected.

use std::{fs, path::Path};

use tracing::warn;

use super::CaptureError;
use super::fs_facts::{FileFacts, read_facts};

/// Digest returned when a folder cannot be enumerated. Always treated as changed.
pub const EMPTY_FINGERPRINT: &str = "";

/// Compute the folder fingerprint, degrading to [`EMPTY_FINGERPRINT`] on failure.
///
/// Top-level files named in `excluded` (the sidecar outcome files) are skipped.
pub fn fingerprint(folder: &Path, excluded: &[&str]) -> String {
    match try_fingerprint(folder, excluded) {
        Ok(digest) => digest,
        Err(err) => {
            warn!(
                folder = %folder.display(),
                error = %err,
                "Fingerprint failed; treating folder as changed"
            );
            EMPTY_FINGERPRINT.to_string()
        }
    }
}

/// Compute the folder fingerprint, surfacing enumeration errors.
pub fn try_fingerprint(folder: &Path, excluded: &[&str]) -> Result<String, CaptureError> {
    let mut facts = collect_facts(folder, excluded)?;
    facts.sort_by(|a, b| a.relative.cmp(&b.relative));
    let tuples: Vec<(&str, i64, u64)> = facts
        .iter()
        .map(|fact| (fact.relative.as_str(), fact.modified_ns, fact.size))
        .collect();
    let serialized = serde_json::to_vec(&tuples).map_err(|source| CaptureError::Io {
        path: folder.to_path_buf(),
        source: source.into(),
    })?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

fn collect_facts(folder: &Path, excluded: &[&str]) -> Result<Vec<FileFacts>, CaptureError> {
    if !folder.is_dir() {
        return Err(CaptureError::InvalidRoot(folder.to_path_buf()));
    }
    let mut facts = Vec::new();
    let mut stack = vec![folder.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| CaptureError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CaptureError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| CaptureError::Io {
                path: path.clone(),
                source,
            })?;
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if dir == folder
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| excluded.contains(&name))
            {
                continue;
            }
            facts.push(read_facts(folder, &path)?);
        }
    }
    Ok(facts)
}
