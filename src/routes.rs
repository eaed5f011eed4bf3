//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Set Request ID  │ ← Generates x-request-id unless the client sent one
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response span, tagged with the ID
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ Propagate Req ID │ ← Copies x-request-id onto the response
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! Rate limiting and CORS are not layers here: both are stages of the form
//! pipeline, which needs them in a fixed order relative to admission.
//!
//! # Routes
//!
//! - `/api/v1/formsubmit` - Every method, decided by the pipeline
//! - `/health`, `/ready` - Health & monitoring

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::routing::{any, get};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use crate::handlers;
use crate::state::AppState;

/// Path of the contact form endpoint.
pub const FORM_SUBMIT_PATH: &str = "/api/v1/formsubmit";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    if config.rate_limiting_enabled() {
        info!(
            window_ms = config.rate_limit_window.as_millis(),
            max_requests = config.rate_limit_max_requests,
            trusted_proxies = config.trusted_proxies.len(),
            "Rate limiting enabled"
        );
    } else {
        info!("Rate limiting disabled (RATE_LIMIT_MAX_REQUESTS=0)");
    }
    info!(
        origins = ?config.allowed_origins,
        max_content_length = config.max_content_length,
        "Form admission configured"
    );

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(request_id));

    Router::new()
        .route(FORM_SUBMIT_PATH, any(handlers::form_submit))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .layer(middleware)
        .with_state(state)
}
