use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::{CaptureError, FolderListing, list_folder};
use crate::config::SyncConfig;
use crate::remote::{
    RemoteError, RemoteStore, TestStatus, UploadMetadata, UploadRecord, content_type_for,
};

use super::sidecar::{FailedFile, SidecarReport};

/// Why a folder upload failed as a whole.
#[derive(Debug, Error)]
pub enum FolderUploadError {
    #[error("Cannot list folder: {0}")]
    Listing(#[from] CaptureError),
    #[error("Record upsert failed: {0}")]
    Record(#[from] RemoteError),
}

/// Result of uploading one folder's images and record.
#[derive(Debug, Clone)]
pub struct FolderUpload {
    pub listing: FolderListing,
    pub test_status: TestStatus,
    /// Public URLs, or bare file names for images that failed to upload.
    pub image_urls: Vec<String>,
    pub uploaded_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
    pub upload_batch: String,
}

impl FolderUpload {
    pub(crate) fn into_report(self, batch_id: &str, config: &SyncConfig) -> SidecarReport {
        let mut report = SidecarReport::new(&self.listing.name, batch_id, &config.remote.device);
        report.status = "success".to_string();
        report.upload_batch = Some(self.upload_batch);
        report.test_status = Some(self.test_status);
        report.uploaded_files = self.uploaded_files;
        report.failed_files = self.failed_files;
        report.image_urls = self.image_urls;
        report
    }
}

/// Upload one folder: every image to object storage, then one record.
///
/// Image failures are tolerated and listed; only a listing failure or a
/// rejected record fails the folder.
pub fn upload_folder(
    remote: &dyn RemoteStore,
    config: &SyncConfig,
    folder: &Path,
    fingerprint: &str,
    batch_id: &str,
) -> Result<FolderUpload, FolderUploadError> {
    let listing = list_folder(folder, &config.payload)?;
    let device = &config.remote.device;
    info!(folder = %listing.name, images = listing.images.len(), "Uploading folder");

    let mut failed_files = Vec::new();
    let mut uploaded_files = Vec::new();
    let mut image_urls = Vec::with_capacity(listing.images.len());

    if !listing.images.is_empty()
        && let Err(err) = remote.ensure_bucket(&config.remote.bucket)
    {
        warn!(bucket = %config.remote.bucket, error = %err, "Could not ensure storage bucket");
    }
    for image in &listing.images {
        match upload_image(remote, config, &listing, image) {
            Ok(url) => {
                debug!(image = %image, url = %url, "Image uploaded");
                uploaded_files.push(image.clone());
                image_urls.push(url);
            }
            Err(err) => {
                warn!(folder = %listing.name, image = %image, error = %err, "Image upload failed");
                failed_files.push(FailedFile {
                    file: image.clone(),
                    error: err.to_string(),
                });
                image_urls.push(image.clone());
            }
        }
    }

    let descriptor = read_descriptor(&listing, &mut failed_files);
    let test_status = TestStatus::from_descriptor(descriptor.as_ref());
    let now = super::now_rfc3339();
    let upload_batch = format!("batch_{}", super::now_epoch_secs());

    let record = UploadRecord {
        folder_name: listing.name.clone(),
        device_id: device.id.clone(),
        images: image_urls.clone(),
        test_results: descriptor,
        test_date: now.clone(),
        test_status,
        upload_batch: upload_batch.clone(),
        metadata: UploadMetadata {
            upload_timestamp: now,
            total_images: listing.images.len(),
            files_processed: listing.files.clone(),
            folder_hash: fingerprint.to_string(),
            image_urls: image_urls.clone(),
            upload_batch_id: Some(batch_id.to_string()),
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            device_type: device.kind.clone(),
        },
        data_type: config.remote.data_type.clone(),
    };
    remote.upsert_record(&config.remote.table, &record)?;
    if let Some(descriptor) = &listing.descriptor
        && !failed_files.iter().any(|failed| descriptor.ends_with(&failed.file))
    {
        uploaded_files.push(config.payload.descriptor_name.clone());
    }
    info!(folder = %listing.name, test_status = test_status.as_str(), "Folder uploaded");

    Ok(FolderUpload {
        listing,
        test_status,
        image_urls,
        uploaded_files,
        failed_files,
        upload_batch,
    })
}

fn upload_image(
    remote: &dyn RemoteStore,
    config: &SyncConfig,
    listing: &FolderListing,
    image: &str,
) -> Result<String, RemoteError> {
    let path = listing.image_path(image);
    let bytes = std::fs::read(&path).map_err(|source| RemoteError::Io { path, source })?;
    remote.upload_object(
        &config.remote.bucket,
        &[config.remote.device.id.as_str(), listing.name.as_str(), image],
        bytes,
        content_type_for(image),
    )
}

/// Parse the descriptor; on failure log it, list it as failed, and return `None`.
fn read_descriptor(listing: &FolderListing, failed_files: &mut Vec<FailedFile>) -> Option<Value> {
    let path = listing.descriptor.as_ref()?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parsed = std::fs::read(path)
        .map_err(|err| err.to_string())
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(|err| err.to_string()));
    match parsed {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(
                descriptor = %path.display(),
                error = %error,
                "Descriptor unreadable; uploading without it"
            );
            failed_files.push(FailedFile { file, error });
            None
        }
    }
}
