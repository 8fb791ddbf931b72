//! Time sources and time formatting.
//!
//! Every staleness decision in the crate asks a [`Clock`] for "now" instead of
//! reading the wall clock directly, so retention and recovery can be driven
//! deterministically in tests with a [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Source of the current wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> EpochMillis;
}

/// Clock backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => duration_to_millis(elapsed),
            // Clock set before 1970
            Err(e) => -duration_to_millis(e.duration()),
        }
    }
}

/// Manually driven clock for tests and simulations.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gpstrail::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now_millis(), 3_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start` epoch milliseconds.
    pub fn new(start: EpochMillis) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: EpochMillis) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_to_millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Render an epoch timestamp as `HH:MM:SS` in the local time zone.
///
/// Returns `--:--:--` for timestamps chrono cannot represent.
pub fn format_clock_time(millis: EpochMillis) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
