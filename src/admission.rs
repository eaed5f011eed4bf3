//! Header-only checks that run before any body byte is read.
//!
//! Order matters and is fixed:
//!
//! 1. `Origin` is in the allow-list
//! 2. `OPTIONS` is answered as a CORS preflight
//! 3. Anything other than `POST` is refused
//! 4. `Content-Type` is exactly `application/json`
//! 5. `Content-Length` is present, numeric and within the ceiling
//!
//! Rate limiting happens before all of these, in the pipeline.

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderMap, HeaderValue, Method};

use crate::config::Config;
use crate::error::AdmissionError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// What an admitted request is allowed to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Answer with CORS headers and stop.
    Preflight,
    /// Read at most `content_length` bytes of body and process the submission.
    Submit {
        origin: HeaderValue,
        content_length: usize,
    },
}

/// Run the admission checks against request headers.
///
/// # Errors
///
/// Returns the [`AdmissionError`] of the first failing check.
pub fn admit(
    method: &Method,
    headers: &HeaderMap,
    config: &Config,
) -> Result<Admission, AdmissionError> {
    let origin = check_origin(headers, &config.allowed_origins)?;

    if *method == Method::OPTIONS {
        return Ok(Admission::Preflight);
    }

    if *method != Method::POST {
        return Err(AdmissionError::MethodNotAllowed(method.clone()));
    }

    check_content_type(headers)?;
    let content_length = check_content_length(headers, config.max_content_length)?;

    Ok(Admission::Submit {
        origin,
        content_length,
    })
}

fn check_origin(headers: &HeaderMap, allowed: &[String]) -> Result<HeaderValue, AdmissionError> {
    let Some(origin) = headers.get(ORIGIN) else {
        return Err(AdmissionError::OriginNotAllowed { origin: None });
    };

    if allowed.iter().any(|a| a.as_bytes() == origin.as_bytes()) {
        Ok(origin.clone())
    } else {
        Err(AdmissionError::OriginNotAllowed {
            origin: Some(String::from_utf8_lossy(origin.as_bytes()).into_owned()),
        })
    }
}

fn check_content_type(headers: &HeaderMap) -> Result<(), AdmissionError> {
    match headers.get(CONTENT_TYPE) {
        Some(value) if value.as_bytes() == JSON_CONTENT_TYPE.as_bytes() => Ok(()),
        Some(value) => Err(AdmissionError::UnsupportedContentType(Some(
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ))),
        None => Err(AdmissionError::UnsupportedContentType(None)),
    }
}

fn check_content_length(headers: &HeaderMap, limit: usize) -> Result<usize, AdmissionError> {
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or(AdmissionError::InvalidContentLength)?;

    if length > limit {
        return Err(AdmissionError::PayloadTooLarge { limit });
    }

    Ok(length)
}
