//! Time source for deadlines, backoff sleeps and snapshot timestamps.

use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Blocking clock used by the orchestrator.
///
/// Deadlines are absolute [`Instant`]s checked before each loop iteration;
/// sleeps block the calling thread.
pub trait Clock {
    fn now(&self) -> Instant;
    fn utc_now(&self) -> OffsetDateTime;
    fn sleep(&self, duration: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn utc_now(&self) -> OffsetDateTime {
        (**self).utc_now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
