//! # Contact Form Relay
//!
//! An HTTP service that accepts contact form submissions from a website,
//! screens them, and forwards each valid one as an HTML email:
//!
//! - **Abuse control**: Per-client fixed-window rate limiting
//! - **Admission**: Origin allow-list, CORS preflight, method, content type
//!   and size checks before any body byte is read
//! - **Validation**: Exact five-field JSON payload with email syntax check,
//!   opaque to callers
//! - **Safety**: HTML escaping of every field before template interpolation
//! - **Observability**: Request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Layers (Request ID → Trace)                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (formsubmit, health)                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (RateLimiter → Admission → Validation → Sanitize  │
//! │            → Template → Dispatcher)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MailTransport (lettre SMTP | log)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use contact_relay::mailer::build_transport;
//! use contact_relay::template::Template;
//! use contact_relay::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let template = Template::load(&config.template_path).await?;
//!     let transport = build_transport(&config)?;
//!
//!     let state = AppState::new(config, template, transport)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Local Development
//!
//! Log mail instead of sending it:
//! ```bash
//! MAIL_TRANSPORT=log MAIL_TO=me@example.com cargo run
//! ```

pub mod admission;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod sanitize;
pub mod state;
pub mod template;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use mailer::{Dispatcher, MailTransport, OutgoingMail};
pub use pipeline::{AdmissionDecision, Outcome};
pub use routes::build_router;
pub use state::AppState;
