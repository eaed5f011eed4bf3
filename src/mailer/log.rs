//! Development transport that logs mail instead of delivering it.

use tracing::{debug, info};

use super::{MailTransport, OutgoingMail, SendFuture};

/// Logs each message at info level (body at debug) and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(async move {
            info!(
                from = %mail.from,
                to = %mail.to,
                reply_to = ?mail.reply_to.as_ref().map(ToString::to_string),
                subject = %mail.subject,
                body_bytes = mail.html_body.len(),
                "Mail not sent (log transport)"
            );
            debug!(body = %mail.html_body, "Mail body");
            Ok(())
        })
    }
}
