use std::time::Duration;

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::pipeline::AdmissionDecision;

/// Body sent for every template or transport failure.
///
/// Deliberately fixed so that nothing about the underlying cause reaches the
/// client. The site this relay serves is German-language.
pub const INTERNAL_ERROR_MESSAGE: &str = "Ein interner Fehler ist aufgetreten.";

/// Rejections raised before the body is read.
///
/// These do not depend on submitted content, so their plain-text bodies are
/// safe to disclose.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("origin {origin:?} is not in the allow-list")]
    OriginNotAllowed { origin: Option<String> },

    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("content type {0:?} is not application/json")]
    UnsupportedContentType(Option<String>),

    #[error("content length header is missing or not a number")]
    InvalidContentLength,

    #[error("payload exceeds the {limit} byte ceiling")]
    PayloadTooLarge { limit: usize },
}

/// Payload problems.
///
/// Never surfaced to the client in any distinguishable way; see
/// [`AppError::into_response`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("data is not an object")]
    NotAnObject,

    #[error("wrong amount of keys: expected {expected}, found {found}")]
    WrongFieldCount { expected: usize, found: usize },

    #[error("missing form data in field `{0}`")]
    EmptyField(String),

    #[error("unexpected field `{0}`")]
    UnexpectedField(String),

    #[error("field `{0}` is not a string")]
    NotAString(String),

    #[error("not a valid mail address")]
    InvalidEmail,
}

/// The configured template could not be produced.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template {path} is unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("template {0} is empty")]
    Empty(String),
}

/// The mail transport did not accept the message.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to build mail message: {0}")]
    Build(String),

    #[error("mail transport rejected the message: {0}")]
    Send(String),

    #[error("mail transport did not answer within {0:?}")]
    Timeout(Duration),
}

/// Application-wide error type.
///
/// Every request-time variant maps to exactly one terminal
/// [`AdmissionDecision`] and one HTTP response shape.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("rate limit exceeded for client {client}")]
    RateLimited { client: String, retry_after: Duration },

    #[error("admission rejected: {0}")]
    Admission(#[from] AdmissionError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("dispatch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// The terminal decision this error represents.
    pub fn decision(&self) -> AdmissionDecision {
        match self {
            AppError::RateLimited { .. } => AdmissionDecision::RateLimited,
            AppError::Admission(err) => match err {
                AdmissionError::OriginNotAllowed { .. } => AdmissionDecision::OriginRejected,
                AdmissionError::MethodNotAllowed(_) => AdmissionDecision::MethodRejected,
                AdmissionError::UnsupportedContentType(_) => {
                    AdmissionDecision::ContentTypeRejected
                }
                AdmissionError::InvalidContentLength | AdmissionError::PayloadTooLarge { .. } => {
                    AdmissionDecision::TooLarge
                }
            },
            AppError::Validation(
                ValidationError::BodyRead(_) | ValidationError::MalformedJson(_),
            ) => AdmissionDecision::MalformedBody,
            AppError::Validation(_) => AdmissionDecision::ValidationFailed,
            AppError::Template(_) | AppError::Transport(_) | AppError::ConfigError(_) => {
                AdmissionDecision::DispatchFailed
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::RateLimited {
                client,
                retry_after,
            } => {
                // Round up so a client that waits exactly this long is admitted
                let retry_secs = (retry_after.as_secs()
                    + u64::from(retry_after.subsec_nanos() > 0))
                .max(1);
                tracing::warn!(client = %client, retry_after_secs = retry_secs, "Rate limit exceeded");
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_secs));
                response
            }

            // Admission failures are safe to describe, but only generically
            AppError::Admission(err) => {
                tracing::info!(error = %err, "Request rejected at admission");
                let (status, message) = match err {
                    AdmissionError::OriginNotAllowed { .. } => {
                        (StatusCode::FORBIDDEN, "Origin not allowed")
                    }
                    AdmissionError::MethodNotAllowed(_) => {
                        (StatusCode::FORBIDDEN, "Method not allowed")
                    }
                    AdmissionError::UnsupportedContentType(_) => {
                        (StatusCode::BAD_REQUEST, "Content-Type must be application/json")
                    }
                    AdmissionError::InvalidContentLength
                    | AdmissionError::PayloadTooLarge { .. } => {
                        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
                    }
                };
                (status, message).into_response()
            }

            // No validation oracle: default status, empty body
            AppError::Validation(err) => {
                tracing::warn!(error = %err, "Submission rejected");
                StatusCode::OK.into_response()
            }

            AppError::Template(_) | AppError::Transport(_) | AppError::ConfigError(_) => {
                tracing::error!(error = %self, "Sending the email failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
            }
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
