//! Wall-clock source.
//!
//! The digit display shows Unix seconds and the pattern seed is the current
//! Unix time, so both take a [`Clock`] instead of calling `SystemTime::now`
//! directly; tests substitute [`crate::mocks::MockClock`].

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch, with sub-second precision.
    fn unix_seconds(&self) -> f64;

    /// Whole seconds since the Unix epoch.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn unix_secs(&self) -> u64 {
        self.unix_seconds().max(0.0) as u64
    }
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> f64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |elapsed| elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.unix_secs() > 1_577_836_800);
    }
}
