use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time source used by the heartbeat supervisor and the register path.
///
/// The core never calls `Instant::now()` directly so that heartbeat timing
/// (§4.7/§8 P6) can be driven deterministically in tests instead of racing
/// real wall-clock sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real, monotonic wall clock. Used in production.
#[derive(Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests: starts at an arbitrary epoch and only
/// advances when told to, so pong-timeout math can be asserted exactly.
pub struct FakeClock {
    epoch: Instant,
    offset_ms: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}
