//! Fixed-window, per-client rate limiting.
//!
//! # Algorithm
//!
//! Each client identifier owns a [`ClientWindow`] holding a request count and
//! the instant its window opened:
//!
//! - No entry, or the window has fully elapsed: reset to `count = 1` and allow
//! - Otherwise: increment, allow while `count <= max_requests`
//!
//! Denied requests still increment the count, so a client hammering the
//! endpoint stays denied until its window ends.
//!
//! # Memory Bound
//!
//! Entries are only evicted by [`RateLimiter::sweep`], which the application
//! state runs once per window. Between sweeps the map holds at most the
//! distinct clients seen during the last two windows.
//!
//! # Concurrency
//!
//! `check` and `sweep` take the same async mutex, so the read-increment-compare
//! sequence for one client can never interleave with another request for that
//! client or with an eviction.

mod clock;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

pub use clock::{Clock, SystemClock};

#[cfg(test)]
pub use clock::MockClock;

/// Request accounting for one client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    /// Requests seen in the current window, including denied ones. Always >= 1.
    pub count: u32,
    /// When the current window opened.
    pub window_start: Instant,
}

impl ClientWindow {
    fn open(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn has_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request admitted; `count` is its position within the current window.
    Allowed { count: u32 },
    /// Request denied until the current window ends.
    Denied { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// In-memory fixed-window rate limiter keyed by client identifier.
pub struct RateLimiter<C: Clock = SystemClock> {
    clients: Mutex<HashMap<String, ClientWindow>>,
    window: Duration,
    max_requests: u32,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter allowing `max_requests` per `window` for each client.
    ///
    /// `max_requests == 0` yields a disabled limiter that admits everything
    /// and tracks nothing.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_clock(window, max_requests, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(window: Duration, max_requests: u32, clock: C) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            window,
            max_requests,
            clock,
        }
    }

    /// Window length, also the sweep period.
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }

    /// Count one request from `client` and decide whether to admit it.
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        if !self.is_enabled() {
            return RateLimitDecision::Allowed { count: 0 };
        }

        let mut clients = self.clients.lock().await;
        let now = self.clock.now();

        let entry = match clients.get_mut(client) {
            Some(entry) if !entry.has_elapsed(now, self.window) => {
                entry.count = entry.count.saturating_add(1);
                *entry
            }
            Some(entry) => {
                *entry = ClientWindow::open(now);
                *entry
            }
            None => {
                let entry = ClientWindow::open(now);
                clients.insert(client.to_string(), entry);
                entry
            }
        };

        if entry.count <= self.max_requests {
            trace!(client, count = entry.count, "Request within rate limit");
            RateLimitDecision::Allowed { count: entry.count }
        } else {
            let elapsed = now.saturating_duration_since(entry.window_start);
            RateLimitDecision::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop every entry whose window has elapsed. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut clients = self.clients.lock().await;
        let now = self.clock.now();
        let before = clients.len();

        clients.retain(|_, entry| !entry.has_elapsed(now, self.window));

        let evicted = before - clients.len();
        if evicted > 0 {
            debug!(evicted, remaining = clients.len(), "Swept expired rate limit windows");
        }
        evicted
    }

    /// Number of client identifiers currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Snapshot of one client's window, mostly for diagnostics and tests.
    pub async fn window_for(&self, client: &str) -> Option<ClientWindow> {
        self.clients.lock().await.get(client).copied()
    }
}
