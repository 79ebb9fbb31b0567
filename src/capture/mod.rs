//! Local view of capture folders: discovery, listing, fingerprinting and readiness.

mod discover;
mod errors;
mod fingerprint;
mod fs_facts;
mod listing;
pub mod readiness;

pub use discover::{DiscoveredFolder, count_files, discover_capture_folders};
pub use errors::CaptureError;
pub use fingerprint::{EMPTY_FINGERPRINT, fingerprint, try_fingerprint};
pub use fs_facts::{dir_modified_ns, folder_name};
pub use listing::{FolderListing, list_folder};
