use std::{
    fs,
    path::Path,
    thread,
    time::Instant,
};

use tracing::{debug, info};

use crate::config::ReadinessSettings;

use super::stability::StabilityPolicy;
use super::{NotReadyReason, Readiness, ReadinessPolicy};

/// Which file signals that the producer has finished a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerPattern {
    /// Exact file name, e.g. `stats.json`.
    FileName(String),
    /// Any file with this lowercase extension, written as `*.ext`.
    Extension(String),
}

impl MarkerPattern {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("*.") {
            Some(ext) => Self::Extension(ext.to_ascii_lowercase()),
            None => Self::FileName(raw.to_string()),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::FileName(name) => file_name == name,
            Self::Extension(ext) => Path::new(file_name)
                .extension()
                .and_then(|found| found.to_str())
                .is_some_and(|found| found.eq_ignore_ascii_case(ext)),
        }
    }

    fn present_in(&self, folder: &Path) -> bool {
        let Ok(entries) = fs::read_dir(folder) else {
            return false;
        };
        entries.filter_map(Result::ok).any(|entry| {
            entry.file_type().is_ok_and(|ft| ft.is_file())
                && self.matches(&entry.file_name().to_string_lossy())
        })
    }
}

/// Waits for a marker file, then for stability, under one shared timeout.
///
/// A marker that never shows up yields [`NotReadyReason::MarkerMissing`]; the
/// caller picks the fallback.
#[derive(Debug, Clone)]
pub struct MarkerGatedPolicy {
    pub marker: MarkerPattern,
    pub stability: StabilityPolicy,
}

impl MarkerGatedPolicy {
    pub fn new(marker: MarkerPattern, stability: StabilityPolicy) -> Self {
        Self { marker, stability }
    }

    pub fn from_settings(settings: &ReadinessSettings) -> Self {
        Self::new(
            MarkerPattern::parse(&settings.marker),
            StabilityPolicy::from_settings(settings),
        )
    }
}

impl ReadinessPolicy for MarkerGatedPolicy {
    fn wait_until_ready(&self, folder: &Path) -> Readiness {
        let started = Instant::now();
        let deadline = started + self.stability.timeout;
        loop {
            let now = Instant::now();
            if self.marker.present_in(folder) {
                info!(
                    folder = %folder.display(),
                    marker = ?self.marker,
                    "Completion marker found"
                );
                break;
            }
            if now >= deadline {
                return Readiness::NotReady(NotReadyReason::MarkerMissing);
            }
            debug!(folder = %folder.display(), "Waiting for completion marker");
            thread::sleep(
                self.stability
                    .poll_interval
                    .min(deadline.saturating_duration_since(now)),
            );
        }
        self.stability.wait_until(folder, started, deadline)
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}
