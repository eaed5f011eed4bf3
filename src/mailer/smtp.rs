//! SMTP delivery through lettre's pooled async transport.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{MailTransport, OutgoingMail, SendFuture};
use crate::config::Config;
use crate::error::{AppError, AppResult, TransportError};

/// Sends through the relay named by `SMTP_URL`.
///
/// The URL selects TLS mode the way lettre does: `smtps://` for implicit TLS,
/// `smtp://host?tls=required` for STARTTLS, plain `smtp://` otherwise.
#[derive(Clone)]
pub struct SmtpMailTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `SMTP_URL` cannot be parsed.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&config.smtp_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid SMTP_URL: {e}")))?
            .timeout(Some(config.mail_timeout));

        if let (Some(user), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            debug!(user = %user, "Using SMTP credentials");
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        info!(
            url = %redact_url(&config.smtp_url),
            timeout_secs = config.mail_timeout.as_secs(),
            "SMTP transport configured"
        );

        Ok(Self {
            inner: builder.build(),
        })
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(mail.from.clone())
            .to(mail.to.clone())
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = &mail.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        builder
            .body(mail.html_body.clone())
            .map_err(|e| TransportError::Build(e.to_string()))
    }
}

impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(async move {
            let message = Self::build_message(mail)?;
            let response = self
                .inner
                .send(message)
                .await
                .map_err(|e| TransportError::Send(e.to_string()))?;

            debug!(code = %response.code(), "SMTP relay accepted message");
            Ok(())
        })
    }
}

/// Strip userinfo from a transport URL before logging it.
fn redact_url(url: &str) -> String {
    match (url.split_once("://"), url.rfind('@')) {
        (Some((scheme, rest)), Some(_)) => {
            let host = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
            format!("{scheme}://***@{host}")
        }
        _ => url.to_string(),
    }
}
