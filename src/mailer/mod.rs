//! Outbound mail dispatch.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher (addresses, subject, timeout, metrics)
//!     |
//!     v
//! Arc<dyn MailTransport>
//!     |-- SmtpMailTransport  (lettre async SMTP, pooled)
//!     `-- LogTransport       (logs instead of sending)
//! ```
//!
//! The dispatcher owns everything fixed by configuration. Transports only
//! deliver a fully built [`OutgoingMail`]. Sends are never retried: a failed
//! or timed-out send is reported once and the request ends with a 500.

mod log;
mod smtp;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lettre::message::Mailbox;
use tracing::{debug, warn};

use crate::config::{Config, TransportKind};
use crate::error::{AppError, AppResult, TransportError};
use crate::metrics;

pub use log::LogTransport;
pub use smtp::SmtpMailTransport;

/// One message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: Mailbox,
    pub to: Mailbox,
    /// The submitter, when their address parses as a mailbox.
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub html_body: String,
}

/// Future returned by [`MailTransport::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Delivers rendered messages.
///
/// Object safe so the application state can hold any implementation behind
/// an `Arc`. Implementations must not retry.
pub trait MailTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a>;
}

/// Build the transport selected by `MAIL_TRANSPORT`.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the SMTP URL is invalid.
pub fn build_transport(config: &Config) -> AppResult<Arc<dyn MailTransport>> {
    match config.mail_transport {
        TransportKind::Smtp => Ok(Arc::new(SmtpMailTransport::from_config(config)?)),
        TransportKind::Log => Ok(Arc::new(LogTransport)),
    }
}

/// Sends rendered submissions to the configured recipient.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    from: Mailbox,
    to: Mailbox,
    subject: String,
    timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.name())
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `MAIL_FROM` or `MAIL_TO` is not a
    /// valid mailbox.
    pub fn new(config: &Config, transport: Arc<dyn MailTransport>) -> AppResult<Self> {
        Ok(Self {
            transport,
            from: parse_mailbox("MAIL_FROM", &config.mail_from)?,
            to: parse_mailbox("MAIL_TO", &config.mail_to)?,
            subject: config.mail_subject.clone(),
            timeout: config.mail_timeout,
        })
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Build the message for `html_body` and hand it to the transport.
    ///
    /// `submitter` becomes the Reply-To address when it parses as a mailbox.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or `TransportError::Timeout` when the
    /// send does not finish within the configured timeout.
    pub async fn dispatch(&self, html_body: String, submitter: &str) -> Result<(), TransportError> {
        let reply_to = submitter.parse::<Mailbox>().ok();
        if reply_to.is_none() {
            debug!("Submitter address is not a valid mailbox, omitting Reply-To");
        }

        let mail = OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            reply_to,
            subject: self.subject.clone(),
            html_body,
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.transport.send(&mail)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };
        let elapsed = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(()) => "success",
            Err(TransportError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        metrics::record_mail_send_duration(status, elapsed);

        if let Err(e) = &result {
            warn!(
                transport = self.transport.name(),
                error = %e,
                duration_secs = elapsed,
                "Mail dispatch failed"
            );
        }

        result
    }
}

fn parse_mailbox(name: &str, value: &str) -> AppResult<Mailbox> {
    value
        .parse()
        .map_err(|e| AppError::ConfigError(format!("Invalid {name} '{value}': {e}")))
}

// =============================================================================
// Test Transports
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message and reports success.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<OutgoingMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl MailTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a> {
            Box::pin(async move {
                self.sent.lock().unwrap().push(mail.clone());
                Ok(())
            })
        }
    }

    /// Always fails with a message that must never reach a client.
    #[derive(Debug, Default)]
    pub struct FailingTransport;

    impl MailTransport for FailingTransport {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn send<'a>(&'a self, _mail: &'a OutgoingMail) -> SendFuture<'a> {
            Box::pin(async {
                Err(TransportError::Send(
                    "554 relay access denied for secret@internal".to_string(),
                ))
            })
        }
    }

    /// Never completes within any reasonable timeout.
    #[derive(Debug, Default)]
    pub struct StalledTransport;

    impl MailTransport for StalledTransport {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn send<'a>(&'a self, _mail: &'a OutgoingMail) -> SendFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
        }
    }
}
