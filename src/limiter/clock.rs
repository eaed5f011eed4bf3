//! Time source for the rate limiter.
//!
//! Production code uses [`SystemClock`]. Tests drive window expiry with
//! [`MockClock`] instead of sleeping.

use std::time::Instant;

/// Monotonic time source.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Controllable clock for tests.
///
/// Clones share the same instant, so advancing one advances all of them.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockClock {
    current: std::sync::Arc<std::sync::Mutex<Instant>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
impl MockClock {
    pub fn new(start: Instant) -> Self {
        Self {
            current: std::sync::Arc::new(std::sync::Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        *self.current.lock().expect("MockClock mutex poisoned") += by;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock().expect("MockClock mutex poisoned")
    }
}
