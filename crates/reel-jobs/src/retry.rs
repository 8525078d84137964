//! Log suppression for poll loops that fail intermittently.
//!
//! Poll loops retry transient errors forever on a fixed cadence, so a
//! service outage would otherwise emit one warning per tick.

use tracing::{debug, warn};

/// Counts consecutive failures and decides which ones get logged.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful status check (resets the count).
    pub fn record_success(&mut self, job_id: &str) {
        if self.suppressed {
            debug!(
                job_id = %job_id,
                "Status checks recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed status check.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self, job_id: &str) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else {
            if !self.suppressed {
                self.suppressed = true;
                warn!(
                    job_id = %job_id,
                    "Suppressing further status-check failures after {} in a row",
                    self.max_logged_failures
                );
            }
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
