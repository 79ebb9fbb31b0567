use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::config::ReadinessSettings;

use super::sample::{SampleError, StabilitySample, take_sample};
use super::{NotReadyReason, Readiness, ReadinessPolicy};

/// Ready once consecutive samples stay equal for `stable_for`.
#[derive(Debug, Clone, Copy)]
pub struct StabilityPolicy {
    pub timeout: Duration,
    pub stable_for: Duration,
    pub poll_interval: Duration,
}

impl StabilityPolicy {
    pub fn new(timeout: Duration, stable_for: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            stable_for,
            poll_interval,
        }
    }

    pub fn from_settings(settings: &ReadinessSettings) -> Self {
        Self::new(
            settings.timeout(),
            settings.stable_for(),
            settings.poll_interval(),
        )
    }

    /// Poll until stable or until `deadline`; `started` anchors the reported wait.
    pub(super) fn wait_until(
        &self,
        folder: &Path,
        started: Instant,
        deadline: Instant,
    ) -> Readiness {
        let mut previous: Option<StabilitySample> = None;
        let mut stable_since: Option<Instant> = None;
        let mut vanished = false;
        loop {
            let now = Instant::now();
            match take_sample(folder) {
                Ok(sample) => {
                    vanished = false;
                    if previous != Some(sample) {
                        if previous.is_some() {
                            debug!(
                                folder = %folder.display(),
                                "Folder changed; stability window reset"
                            );
                        }
                        previous = Some(sample);
                        stable_since = Some(now);
                    }
                    let since = stable_since.unwrap_or(now);
                    if now.duration_since(since) >= self.stable_for {
                        let waited = now.duration_since(started);
                        info!(
                            folder = %folder.display(),
                            waited_ms = waited.as_millis() as u64,
                            "Folder is stable"
                        );
                        return Readiness::Ready { waited };
                    }
                }
                Err(err) => {
                    vanished = matches!(err, SampleError::Missing);
                    debug!(folder = %folder.display(), reason = %err, "Folder not settled");
                    previous = None;
                    stable_since = None;
                }
            }
            if now >= deadline {
                let reason = if vanished {
                    NotReadyReason::Vanished
                } else {
                    NotReadyReason::TimedOut
                };
                return Readiness::NotReady(reason);
            }
            thread::sleep(self.poll_interval.min(deadline.saturating_duration_since(now)));
        }
    }
}

impl ReadinessPolicy for StabilityPolicy {
    fn wait_until_ready(&self, folder: &Path) -> Readiness {
        let started = Instant::now();
        self.wait_until(folder, started, started + self.timeout)
    }

    fn name(&self) -> &'static str {
        "stability"
    }
}
