//! The form submission pipeline.
//!
//! Every request to the form endpoint runs the same ordered stages:
//!
//! ```text
//! rate limit -> admission -> read body -> validate -> escape -> render -> dispatch
//! ```
//!
//! Each stage returns `Result<_, AppError>` and `?` ends the request at the
//! first failure. Whatever happens, the request ends in exactly one
//! [`Outcome`], which maps to exactly one terminal [`AdmissionDecision`].
//!
//! The rate limiter runs before the method switch, so CORS preflights spend
//! the same per-client budget as submissions and an exhausted client is
//! answered 429 even on `OPTIONS`.

use std::fmt;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, trace};

use crate::admission::{Admission, admit};
use crate::error::{AdmissionError, AppError, AppResult, ValidationError};
use crate::limiter::RateLimitDecision;
use crate::models::SuccessResponse;
use crate::sanitize::EscapedSubmission;
use crate::state::AppState;
use crate::validation::parse_submission;

/// How a request was decided.
///
/// `Allowed` marks a request that passed admission and is about to read its
/// body. Every finished request carries one of the other variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionDecision {
    Allowed,
    RateLimited,
    OriginRejected,
    PreflightHandled,
    MethodRejected,
    ContentTypeRejected,
    TooLarge,
    MalformedBody,
    ValidationFailed,
    DispatchFailed,
    Sent,
}

impl AdmissionDecision {
    /// Stable snake_case label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::RateLimited => "rate_limited",
            Self::OriginRejected => "origin_rejected",
            Self::PreflightHandled => "preflight_handled",
            Self::MethodRejected => "method_rejected",
            Self::ContentTypeRejected => "content_type_rejected",
            Self::TooLarge => "too_large",
            Self::MalformedBody => "malformed_body",
            Self::ValidationFailed => "validation_failed",
            Self::DispatchFailed => "dispatch_failed",
            Self::Sent => "sent",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Allowed)
    }
}

impl fmt::Display for AdmissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum Outcome {
    /// The mail went out. `origin` is echoed back to the caller.
    Sent { origin: HeaderValue },
    /// CORS preflight answered.
    Preflight { allow_origin: HeaderValue },
    /// Some stage refused the request.
    Rejected(AppError),
}

impl Outcome {
    pub fn decision(&self) -> AdmissionDecision {
        match self {
            Self::Sent { .. } => AdmissionDecision::Sent,
            Self::Preflight { .. } => AdmissionDecision::PreflightHandled,
            Self::Rejected(err) => err.decision(),
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Sent { origin } => {
                let mut response = (StatusCode::OK, Json(SuccessResponse::default())).into_response();
                response
                    .headers_mut()
                    .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                response
            }
            Self::Preflight { allow_origin } => (
                StatusCode::NO_CONTENT,
                [
                    (ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin),
                    (ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST")),
                    (
                        ACCESS_CONTROL_ALLOW_HEADERS,
                        HeaderValue::from_static("Content-Type"),
                    ),
                ],
            )
                .into_response(),
            Self::Rejected(err) => err.into_response(),
        }
    }
}

/// Run the whole pipeline for one request from `client`.
pub async fn process(state: &AppState, client: &str, request: Request<Body>) -> Outcome {
    match run(state, client, request).await {
        Ok(outcome) => outcome,
        Err(err) => Outcome::Rejected(err),
    }
}

async fn run(state: &AppState, client: &str, request: Request<Body>) -> AppResult<Outcome> {
    if let RateLimitDecision::Denied { retry_after } = state.limiter.check(client).await {
        return Err(AppError::RateLimited {
            client: client.to_string(),
            retry_after,
        });
    }

    let (parts, body) = request.into_parts();

    let origin = match admit(&parts.method, &parts.headers, &state.config)? {
        Admission::Preflight => {
            return Ok(Outcome::Preflight {
                allow_origin: preflight_origin(state)?,
            });
        }
        Admission::Submit {
            origin,
            content_length,
        } => {
            trace!(
                client,
                content_length,
                decision = %AdmissionDecision::Allowed,
                "Request admitted"
            );
            origin
        }
    };

    let bytes = read_body(body, state.config.max_content_length).await?;
    let submission = parse_submission(&bytes)?;
    let escaped = EscapedSubmission::from_submission(&submission);
    let html_body = state.template.render(&escaped);

    state
        .dispatcher
        .dispatch(html_body, &submission.email)
        .await?;

    debug!(client, "Submission dispatched");
    Ok(Outcome::Sent { origin })
}

fn preflight_origin(state: &AppState) -> AppResult<HeaderValue> {
    HeaderValue::from_str(state.config.preflight_origin())
        .map_err(|e| AppError::ConfigError(format!("Invalid preflight origin: {e}")))
}

/// Buffer the body, refusing to hold more than `limit` bytes.
///
/// The declared `Content-Length` was already checked, but the stream itself
/// is capped too in case it carries more than it announced.
async fn read_body(body: Body, limit: usize) -> AppResult<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(AdmissionError::PayloadTooLarge { limit }.into())
        }
        Err(err) => Err(ValidationError::BodyRead(err.to_string()).into()),
    }
}
