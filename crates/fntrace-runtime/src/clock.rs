//! Injectable clocks. The flush queue's options name `system_clock`/`steady_clock` explicitly
//! so retention and barrier checks can be driven deterministically in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic nanosecond clock, analogous to `std::time::Instant`.
pub trait SteadyClock: Send + Sync {
    fn now_ns(&self) -> i64;
}

/// A wall-clock nanosecond clock, analogous to `std::time::SystemTime`.
pub trait SystemClock: Send + Sync {
    fn now_ns(&self) -> i64;
}

/// The real steady clock, anchored at process start so values fit in an `i64` nanosecond count.
pub struct RealSteadyClock {
    start: std::time::Instant,
}

impl Default for RealSteadyClock {
    fn default() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl SteadyClock for RealSteadyClock {
    fn now_ns(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// The real system clock, nanoseconds since the Unix epoch.
#[derive(Default)]
pub struct RealSystemClock;

impl SystemClock for RealSystemClock {
    fn now_ns(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => i64::try_from(since_epoch.as_nanos()).unwrap_or(i64::MAX),
            Err(_) => 0,
        }
    }
}

/// A clock whose value is set explicitly, for deterministic retention/barrier tests.
#[derive(Default)]
pub struct ManualClock {
    now_ns: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(initial_ns: i64) -> Self {
        Self {
            now_ns: AtomicI64::new(initial_ns),
        }
    }

    pub fn set_ns(&self, value: i64) {
        self.now_ns.store(value, Ordering::Release);
    }

    pub fn advance_ns(&self, delta: i64) {
        self.now_ns.fetch_add(delta, Ordering::AcqRel);
    }
}

impl SteadyClock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Acquire)
    }
}

impl SystemClock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Acquire)
    }
}
