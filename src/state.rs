//! Shared application state for Axum handlers.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all request handlers. It includes:
//!
//! - **Rate limiter**: Per-client fixed-window accounting
//! - **Template**: Mail body template, loaded once at startup
//! - **Dispatcher**: Mail transport plus fixed addresses and subject
//! - **Configuration**: Runtime configuration access
//!
//! # Structured Concurrency
//!
//! Background tasks are managed using `tokio_util::task::TaskTracker` and
//! `CancellationToken` for proper lifecycle management. Call `shutdown()`
//! to gracefully stop all background tasks before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::error::AppResult;
use crate::limiter::RateLimiter;
use crate::mailer::{Dispatcher, MailTransport};
use crate::metrics;
use crate::middleware::TrustedProxyConfig;
use crate::template::Template;

/// Shared application state for Axum handlers.
///
/// # Lifecycle
///
/// The rate limiter sweep is spawned when the state is created (so creation
/// must happen inside a Tokio runtime). Call `shutdown()` before dropping:
///
/// ```rust,ignore
/// let state = AppState::new(config, template, transport)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Per-client request accounting
    pub limiter: Arc<RateLimiter>,
    /// Mail body template
    pub template: Arc<Template>,
    /// Mail dispatch
    pub dispatcher: Dispatcher,
    /// Proxies whose forwarded-for headers are believed
    pub trusted_proxies: Arc<TrustedProxyConfig>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create application state and start the rate limiter sweep.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the configuration fails
    /// [`Config::validate`] or the configured mail addresses are not valid
    /// mailboxes.
    pub fn new(
        config: Config,
        template: Template,
        transport: Arc<dyn MailTransport>,
    ) -> AppResult<Self> {
        // The sweep ticks once per window, which must be non-zero
        config.validate()?;

        let dispatcher = Dispatcher::new(&config, transport)?;
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));
        let trusted_proxies = Arc::new(TrustedProxyConfig::new(&config.trusted_proxies));

        let state = Self {
            config: Arc::new(config),
            limiter,
            template: Arc::new(template),
            dispatcher,
            trusted_proxies,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        if state.limiter.is_enabled() {
            state.spawn_sweep_task();
        }

        Ok(state)
    }

    /// Spawn the periodic rate limiter sweep.
    ///
    /// Runs once per window, evicting entries whose window has elapsed and
    /// publishing the tracked-client gauge. Only the limiter is cloned into
    /// the task.
    fn spawn_sweep_task(&self) {
        let limiter = self.limiter.clone();
        let period = limiter.window();
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!("Rate limiter sweep received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep().await;
                        let tracked = limiter.tracked_clients().await;
                        metrics::record_evictions(evicted);
                        metrics::set_tracked_clients(tracked);
                        trace!(evicted, tracked, "Rate limiter sweep complete");
                    }
                }
            }

            debug!("Rate limiter sweep shutting down");
        });
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// This method:
    /// 1. Signals all tasks to stop via cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Whether `shutdown()` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
