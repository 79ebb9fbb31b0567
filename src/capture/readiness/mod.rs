//! Folder readiness: deciding when a producer has finished writing a folder.
//!
//! Readiness is a heuristic, so it sits behind [`ReadinessPolicy`]. The
//! stability policy waits for the folder to stop changing; the marker-gated
//! policy first waits for a completion marker file.

use std::{path::Path, time::Duration};

use crate::config::ReadinessSettings;

mod marker;
mod sample;
mod stability;

pub use marker::{MarkerGatedPolicy, MarkerPattern};
pub use sample::{SampleError, StabilitySample, take_sample};
pub use stability::StabilityPolicy;

/// Why a folder was not ready before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    TimedOut,
    MarkerMissing,
    /// The folder was missing at the deadline.
    Vanished,
}

impl NotReadyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimedOut => "timed out waiting for folder to settle",
            Self::MarkerMissing => "completion marker never appeared",
            Self::Vanished => "folder disappeared",
        }
    }
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { waited: Duration },
    NotReady(NotReadyReason),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Blocking wait for a folder to become safe to process.
pub trait ReadinessPolicy {
    /// Poll `folder` until ready or until the policy's timeout elapses.
    fn wait_until_ready(&self, folder: &Path) -> Readiness;
    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Selects a readiness policy by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessMode {
    #[default]
    Stability,
    MarkerGated,
}

/// Build the policy for `mode` from configuration.
pub fn build_policy(mode: ReadinessMode, settings: &ReadinessSettings) -> Box<dyn ReadinessPolicy> {
    match mode {
        ReadinessMode::Stability => Box::new(StabilityPolicy::from_settings(settings)),
        ReadinessMode::MarkerGated => Box::new(MarkerGatedPolicy::from_settings(settings)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_policy_honours_mode() {
        let settings = ReadinessSettings::default();
        assert_eq!(build_policy(ReadinessMode::Stability, &settings).name(), "stability");
        assert_eq!(build_policy(ReadinessMode::MarkerGated, &settings).name(), "marker");
    }
}
