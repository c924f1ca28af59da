//! Clock port.

use std::time::{SystemTime, UNIX_EPOCH};

/// Time source trait for testability.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// System time implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            // Clock before Unix epoch - report 0 rather than panic
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemTimeSource.now_millis() > 1_577_836_800_000);
    }
}
