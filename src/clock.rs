//! Wall-clock sources
//!
//! The engine never reads the system time directly; it asks a [`Clock`] so that
//! replays and tests can drive time explicitly.

use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Date format used for day rollover markers
pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub trait Clock: Send {
    /// Current epoch milliseconds
    fn now_ms(&self) -> i64;

    /// Current calendar date as YYYY-MM-DD
    fn today(&self) -> String;
}

/// System time, with the calendar date taken in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> String {
        Local::now().format(DAY_FORMAT).to_string()
    }
}

/// Manually driven clock; the calendar date is the UTC date of `now_ms`.
///
/// Clones share the same time, so a test can keep one copy and hand another to
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn today(&self) -> String {
        day_of(self.now_ms())
    }
}

/// UTC calendar date of an epoch-millisecond timestamp
pub fn day_of(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_default()
        .format(DAY_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-01T23:59:00Z
    const NEAR_MIDNIGHT: i64 = 1_704_153_540_000;

    #[test]
    fn test_manual_clock_day_changes_at_midnight() {
        let clock = ManualClock::new(NEAR_MIDNIGHT);
        assert_eq!(clock.today(), "2024-01-01");

        clock.advance(60_000);
        assert_eq!(clock.today(), "2024-01-02");
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let engine_copy = clock.clone();
        clock.set(5_000);
        assert_eq!(engine_copy.now_ms(), 5_000);
    }

    #[test]
    fn test_system_clock_day_format() {
        let today = SystemClock.today();
        assert_eq!(today.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&today, DAY_FORMAT).is_ok());
    }
}
