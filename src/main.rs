use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use contact_relay::config::LogFormat;
use contact_relay::mailer::build_transport;
use contact_relay::template::Template;
use contact_relay::{AppResult, AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // .env may set RUST_LOG and LOG_FORMAT, so load it before anything else
    let _ = dotenvy::dotenv();

    // Logging settings come from the config; a config that fails to load
    // still gets default logging so the error is reported
    let config = Config::from_env();
    match &config {
        Ok(config) => init_tracing(&config.log_level, config.log_format),
        Err(_) => init_tracing("info", LogFormat::Pretty),
    }

    info!(
        "Starting contact form relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Initialize the tracing subscriber.
fn init_tracing(filter: &str, format: LogFormat) {
    // The directive was checked by Config::validate
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
    }
}

/// Run the application, returning an exit code on error.
async fn run(config: AppResult<Config>) -> Result<(), exitcode::ExitCode> {
    let config = config.map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        transport = %config.mail_transport,
        origins = config.allowed_origins.len(),
        "Configuration loaded"
    );

    // The template is read exactly once; a missing template is fatal
    let template = Template::load(&config.template_path).await.map_err(|e| {
        error!("Failed to load mail template: {e}");
        exitcode::CONFIG
    })?;

    let transport = build_transport(&config).map_err(|e| {
        error!("Failed to configure mail transport: {e}");
        exitcode::CONFIG
    })?;

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    } else {
        warn!("Prometheus metrics disabled (METRICS_PORT=0)");
    }

    // Build application state and router
    let state = AppState::new(config.clone(), template, transport).map_err(|e| {
        error!("Failed to build application state: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  OPTIONS /api/v1/formsubmit - CORS preflight");
    info!("  POST    /api/v1/formsubmit - Submit the contact form");
    info!("  GET     /health            - Health check");
    info!("  GET     /ready             - Readiness check");

    // The peer address keys the rate limiter, so serve with ConnectInfo
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    // Gracefully shutdown background tasks
    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
