use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body returned after a submission was handed to the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl Default for SuccessResponse {
    fn default() -> Self {
        Self {
            message: "Success".to_string(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since the application state was created
    pub uptime_seconds: u64,
    /// Client windows currently held by the rate limiter
    pub tracked_clients: usize,
    /// Whether per-client rate limiting is active
    pub rate_limiting_enabled: bool,
    /// Name of the configured mail transport (`smtp` or `log`)
    pub mail_transport: String,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}
