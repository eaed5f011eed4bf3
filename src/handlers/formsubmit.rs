//! The contact form endpoint.
//!
//! Registered for every method on `/api/v1/formsubmit`; the pipeline decides
//! what each method gets. The handler resolves the client identifier, runs
//! the pipeline, then logs and counts the terminal decision.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::metrics;
use crate::middleware::client_identifier;
use crate::pipeline;
use crate::state::AppState;

/// Handle one form request.
///
/// Takes the raw request so the body is only read after admission passed.
pub async fn form_submit(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client = client_identifier(&request, &state.trusted_proxies);
    let method = request.method().clone();

    let outcome = pipeline::process(&state, &client, request).await;
    let decision = outcome.decision();

    metrics::record_decision(decision);
    // Rejection causes are logged when the error becomes a response
    info!(client = %client, method = %method, decision = %decision, "Form request finished");

    outcome.into_response()
}
