//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness plus a few runtime details
//! - `GET /ready` - Readiness probe, 503 once shutdown has begun

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// Always returns 200 OK while the process is serving.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptime_seconds": 3600,
///   "tracked_clients": 4,
///   "rate_limiting_enabled": true,
///   "mail_transport": "smtp",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        tracked_clients: state.limiter.tracked_clients().await,
        rate_limiting_enabled: state.limiter.is_enabled(),
        mail_transport: state.dispatcher.transport_name().to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for load balancer and Kubernetes probes.
///
/// The template and transport are set up before the listener binds, so a
/// serving process is ready until shutdown starts.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
