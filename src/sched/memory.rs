//! System memory sampling and pressure back-off.

use std::time::Duration;

use sysinfo::System;
use tracing::{debug, warn};

/// Interval between back-off polls while waiting for memory to drop.
const BACKOFF_TICK: Duration = Duration::from_secs(5);

/// Points below the cap that usage must reach before work resumes.
pub const RELEASE_MARGIN_PERCENT: f64 = 5.0;

/// Extra free memory demanded on top of the floor before work resumes.
pub const RELEASE_MARGIN_MB: u64 = 500;

/// Samples process-wide memory through sysinfo.
pub struct MemoryMonitor {
    system: System,
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor {
    /// Creates a monitor with an initial sample.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self { system }
    }

    /// Used memory as a percentage of total, freshly sampled.
    pub fn percent_used(&mut self) -> f64 {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return 0.0;
        }
        self.system.used_memory() as f64 / total as f64 * 100.0
    }

    /// Available memory in megabytes, freshly sampled.
    pub fn available_mb(&mut self) -> u64 {
        self.system.refresh_memory();
        self.system.available_memory() / (1024 * 1024)
    }

    /// True iff usage is above `limit_percent`.
    pub fn over_limit(&mut self, limit_percent: f64) -> bool {
        self.percent_used() > limit_percent
    }

    /// Blocks in 5-second ticks until usage falls at least
    /// [`RELEASE_MARGIN_PERCENT`] points below the cap and available
    /// memory reaches `floor_mb + 500`.
    pub fn block_until_released(&mut self, limit_percent: f64, floor_mb: u64) {
        warn!(
            used_percent = self.percent_used(),
            limit_percent, "memory pressure detected, backing off"
        );
        loop {
            let used = self.percent_used();
            let available = self.available_mb();
            if used <= limit_percent - RELEASE_MARGIN_PERCENT
                && available >= floor_mb + RELEASE_MARGIN_MB
            {
                debug!(used_percent = used, available_mb = available, "memory released");
                return;
            }
            debug!(used_percent = used, available_mb = available, "waiting for memory");
            std::thread::sleep(BACKOFF_TICK);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn percent_in_sane_range() {
        let mut monitor = MemoryMonitor::new();
        let percent = monitor.percent_used();
        assert!((0.0..=100.0).contains(&percent));
    }

    #[test]
    fn over_limit_against_impossible_cap() {
        let mut monitor = MemoryMonitor::new();
        assert!(!monitor.over_limit(100.0));
        assert!(monitor.over_limit(0.0) || monitor.percent_used() == 0.0);
    }
}
