use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time, in seconds since the Unix epoch.
///
/// Protection stamps fragment markers with it and recovery compares those
/// markers against it, so both sides must read the same kind of clock.
pub trait Clock {
    fn now(&self) -> f64;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(42.5);
        assert_eq!(clock.now(), 42.5);
        assert_eq!(clock.now(), 42.5);
    }
}
