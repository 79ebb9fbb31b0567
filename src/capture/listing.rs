use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::PayloadSettings;

use super::CaptureError;
use super::fs_facts::folder_name;

/// Files directly inside one capture folder, grouped by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderListing {
    pub folder: PathBuf,
    pub name: String,
    /// Every regular file name in the folder except sidecars, sorted.
    pub files: Vec<String>,
    /// Image file names, sorted.
    pub images: Vec<String>,
    pub descriptor: Option<PathBuf>,
}

impl FolderListing {
    pub fn image_path(&self, image: &str) -> PathBuf {
        self.folder.join(image)
    }
}

/// List the direct regular files of `folder`.
pub fn list_folder(
    folder: &Path,
    payload: &PayloadSettings,
) -> Result<FolderListing, CaptureError> {
    let entries = fs::read_dir(folder).map_err(|source| CaptureError::Io {
        path: folder.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    let mut images = Vec::new();
    let mut descriptor = None;
    for entry in entries {
        let entry = entry.map_err(|source| CaptureError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_ok_and(|ft| ft.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if payload.is_sidecar(&name) {
            continue;
        }
        if payload.is_image(&path) {
            images.push(name.clone());
        } else if payload.is_descriptor(&path) {
            descriptor = Some(path);
        }
        files.push(name);
    }
    files.sort();
    images.sort();
    Ok(FolderListing {
        folder: folder.to_path_buf(),
        name: folder_name(folder),
        files,
        images,
        descriptor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn groups_images_descriptor_and_skips_sidecars() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Batch1");
        fs::create_dir(&folder).unwrap();
        for name in ["b.png", "a.jpeg", "stats.json", "success.json", "log.txt"] {
            fs::write(folder.join(name), b"x").unwrap();
        }
        fs::create_dir(folder.join("thumbs")).unwrap();

        let listing = list_folder(&folder, &PayloadSettings::default()).unwrap();
        assert_eq!(listing.name, "Batch1");
        assert_eq!(listing.images, vec!["a.jpeg", "b.png"]);
        assert_eq!(listing.descriptor, Some(folder.join("stats.json")));
        assert_eq!(listing.files, vec!["a.jpeg", "b.png", "log.txt", "stats.json"]);
    }

    #[test]
    fn unreadable_folder_is_an_error() {
        let dir = tempdir().unwrap();
        let err = list_folder(&dir.path().join("gone"), &PayloadSettings::default()).unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
    }
}
