use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    time::SystemTime,
};

use thiserror::Error;

/// Observable state of a folder at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySample {
    /// Direct entries, files and subdirectories alike.
    pub entry_count: usize,
    pub dir_modified: SystemTime,
}

/// Reasons a poll could not produce a usable sample.
///
/// None of these are fatal; they reset the stability window.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The folder does not exist (yet, or anymore).
    #[error("Folder is missing")]
    Missing,
    /// The folder holds no regular files.
    #[error("Folder has no files yet")]
    NoFiles,
    /// An entry or the folder itself could not be read.
    #[error("Cannot access {path}: {source}")]
    Inaccessible {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A file opened but returned no bytes.
    #[error("File is still being written: {0}")]
    StillWriting(PathBuf),
}

/// Probe `folder` once.
///
/// Every direct entry must expose metadata and every regular file must yield
/// at least one byte; a zero-length file is taken as a write in progress.
pub fn take_sample(folder: &Path) -> Result<StabilitySample, SampleError> {
    let meta = match fs::metadata(folder) {
        Ok(meta) if meta.is_dir() => meta,
        Ok(_) => return Err(SampleError::Missing),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SampleError::Missing);
        }
        Err(source) => return Err(inaccessible(folder, source)),
    };
    let dir_modified = meta.modified().map_err(|source| inaccessible(folder, source))?;
    let entries = fs::read_dir(folder).map_err(|source| inaccessible(folder, source))?;

    let mut entry_count = 0usize;
    let mut file_count = 0usize;
    for entry in entries {
        let entry = entry.map_err(|source| inaccessible(folder, source))?;
        let path = entry.path();
        let entry_meta = entry.metadata().map_err(|source| inaccessible(&path, source))?;
        entry_count += 1;
        if entry_meta.is_file() {
            file_count += 1;
            probe_first_byte(&path)?;
        }
    }
    if file_count == 0 {
        return Err(SampleError::NoFiles);
    }
    Ok(StabilitySample {
        entry_count,
        dir_modified,
    })
}

fn probe_first_byte(path: &Path) -> Result<(), SampleError> {
    let mut file = fs::File::open(path).map_err(|source| inaccessible(path, source))?;
    let mut byte = [0u8; 1];
    match file.read(&mut byte) {
        Ok(0) => Err(SampleError::StillWriting(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(source) => Err(inaccessible(path, source)),
    }
}

fn inaccessible(path: &Path, source: std::io::Error) -> SampleError {
    SampleError::Inaccessible {
        path: path.to_path_buf(),
        source,
    }
}
