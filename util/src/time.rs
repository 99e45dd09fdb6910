//! General time utility functions
//!
//! Cyclic processing never reads the wall clock directly. Instead it is given
//! a [`Clock`], which is a [`SystemClock`] in the executables and a
//! [`ManualClock`] in tests, so cadence can be stepped deterministically.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of monotonic time which can also suspend the caller.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Wall-clock time, for timestamping records.
    fn utc(&self) -> DateTime<Utc>;

    /// Suspend the caller for the given duration.
    fn sleep(&self, duration: Duration);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Clock backed by `std::time::Instant` and `thread::sleep`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

/// A virtual clock which only moves when told to.
///
/// Sleeping on a manual clock advances it by the slept duration and returns
/// immediately.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

/// Keeps a cyclic process running at a fixed period.
#[derive(Debug)]
pub struct CycleTimer {
    period: Duration,
    cycle_start: Duration,

    /// Number of consecutive cycles which took longer than the period.
    pub num_consec_overruns: u64,

    /// Number of cycles completed.
    pub num_cycles: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = match self.now.lock() {
            Ok(n) => n,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        match self.now.lock() {
            Ok(n) => *n,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// The Unix epoch plus the time elapsed on this clock.
    fn utc(&self) -> DateTime<Utc> {
        DateTime::from(UNIX_EPOCH + self.now())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration)
    }
}

impl CycleTimer {
    /// Create a new timer with the given period in seconds.
    pub fn new(period_s: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(period_s),
            cycle_start: Duration::default(),
            num_consec_overruns: 0,
            num_cycles: 0,
        }
    }

    /// The target period of one cycle.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Mark the start of a cycle.
    pub fn start(&mut self, clock: &dyn Clock) {
        self.cycle_start = clock.now();
    }

    /// Finish the cycle, sleeping for the remainder of the period.
    ///
    /// Returns the overrun if the cycle took longer than the period, in which
    /// case no sleep happens.
    pub fn finish(&mut self, clock: &dyn Clock) -> Option<Duration> {
        let cycle_dur = clock.now().checked_sub(self.cycle_start).unwrap_or_default();
        self.num_cycles += 1;

        match self.period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_overruns = 0;
                clock.sleep(d);
                None
            }
            None => {
                self.num_consec_overruns += 1;
                Some(cycle_dur - self.period)
            }
        }
    }
}
