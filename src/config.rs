//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with defaults that
//! suit a single-site deployment. A `.env` file is honored when present.
//!
//! # Admission
//!
//! - `ALLOWED_ORIGINS`: Comma-separated origin allow-list. The first entry is
//!   echoed in preflight responses. `*` is rejected.
//! - `MAX_CONTENT_LENGTH`: Body ceiling in bytes (default: 1000)
//!
//! # Rate Limiting
//!
//! - `RATE_LIMIT_WINDOW_MS`: Fixed window length (default: 60000)
//! - `RATE_LIMIT_MAX_REQUESTS`: Requests per window per client (default: 10, 0 = off)
//! - `TRUSTED_PROXIES`: CIDR ranges whose forwarded headers are honored
//!
//! # Mail
//!
//! - `MAIL_TO` (required), `MAIL_FROM`, `MAIL_SUBJECT`, `MAIL_TIMEOUT_SECS`
//! - `MAIL_TRANSPORT`: `smtp` (default) or `log`
//! - `SMTP_URL`, `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `TEMPLATE_PATH`: Mail body template, read once at startup
//!
//! # Observability
//!
//! - `RUST_LOG`: tracing filter directives (default: info)
//! - `LOG_FORMAT`: `pretty` (default) or `json`
//! - `METRICS_PORT`: Prometheus listener (default: 9090, 0 = off)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Which outbound transport delivers rendered submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Deliver through an SMTP relay.
    Smtp,
    /// Log the message and report success. For local development.
    Log,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown transport '{other}' (expected smtp or log)")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp => f.write_str("smtp"),
            Self::Log => f.write_str("log"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Admission Configuration
    // =========================================================================
    /// Origins allowed to submit the form. Compared byte-for-byte.
    pub allowed_origins: Vec<String>,

    /// Maximum accepted `Content-Length` and hard cap while streaming the body
    pub max_content_length: usize,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Length of one fixed rate-limit window
    pub rate_limit_window: Duration,

    /// Requests allowed per client per window (0 disables rate limiting)
    pub rate_limit_max_requests: u32,

    /// Trusted proxy CIDR ranges. Forwarded client IP headers are only
    /// honored when the peer address falls inside one of these ranges.
    ///
    /// Default: Empty (always key on the peer address)
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Mail Configuration
    // =========================================================================
    /// Outbound transport
    pub mail_transport: TransportKind,

    /// Sender mailbox, e.g. `Kontaktformular <noreply@example.com>`
    pub mail_from: String,

    /// Recipient mailbox for every submission
    pub mail_to: String,

    /// Fixed subject line
    pub mail_subject: String,

    /// Upper bound for one send; expiry counts as a dispatch failure
    pub mail_timeout: Duration,

    /// lettre transport URL (`smtp://`, `smtps://`, `smtp://host?tls=required`)
    pub smtp_url: String,

    pub smtp_username: Option<String>,

    pub smtp_password: Option<String>,

    /// Path of the HTML mail template
    pub template_path: PathBuf,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Log output format (default: pretty)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value does not parse, `MAIL_TO`
    /// is missing, or the combination fails [`Config::validate`].
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,

            // Admission
            allowed_origins: Self::parse_list("ALLOWED_ORIGINS", "http://127.0.0.1:62052"),
            max_content_length: Self::parse_env("MAX_CONTENT_LENGTH", 1000)?,

            // Rate limiting
            rate_limit_window: Duration::from_millis(Self::parse_env(
                "RATE_LIMIT_WINDOW_MS",
                60_000,
            )?),
            rate_limit_max_requests: Self::parse_env("RATE_LIMIT_MAX_REQUESTS", 10)?,
            trusted_proxies: Self::parse_list("TRUSTED_PROXIES", ""),

            // Mail
            mail_transport: Self::parse_env("MAIL_TRANSPORT", TransportKind::Smtp)?,
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@localhost".to_string()),
            mail_to: env::var("MAIL_TO")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::ConfigError("MAIL_TO must be set".to_string()))?,
            mail_subject: env::var("MAIL_SUBJECT")
                .unwrap_or_else(|_| "Neue Kundenanfrage über das Kontaktformular".to_string()),
            mail_timeout: Duration::from_secs(Self::parse_env("MAIL_TIMEOUT_SECS", 10)?),
            smtp_url: env::var("SMTP_URL").unwrap_or_else(|_| "smtp://localhost:25".to_string()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            template_path: env::var("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("system/templates/formsubmit.html")),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Pretty)?,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.allowed_origins.is_empty() {
            return Err(AppError::ConfigError(
                "ALLOWED_ORIGINS must contain at least one origin".to_string(),
            ));
        }

        if self.allowed_origins.iter().any(|o| o == "*") {
            return Err(AppError::ConfigError(
                "ALLOWED_ORIGINS must list explicit origins; '*' is not supported".to_string(),
            ));
        }

        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(AppError::ConfigError(format!(
                "ALLOWED_ORIGINS entry '{origin}' is not a valid header value"
            )));
        }

        if self.max_content_length == 0 {
            return Err(AppError::ConfigError(
                "MAX_CONTENT_LENGTH must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_WINDOW_MS must be greater than 0".to_string(),
            ));
        }

        if self.mail_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "MAIL_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = EnvFilter::try_new(&self.log_level) {
            return Err(AppError::ConfigError(format!(
                "Invalid RUST_LOG '{}': {e}",
                self.log_level
            )));
        }

        if self.smtp_username.is_some() != self.smtp_password.is_some() {
            return Err(AppError::ConfigError(
                "SMTP_USERNAME and SMTP_PASSWORD must be set together".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_max_requests > 0
    }

    /// Origin echoed in `Access-Control-Allow-Origin` on preflight responses.
    pub fn preflight_origin(&self) -> &str {
        self.allowed_origins.first().map(String::as_str).unwrap_or_default()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping blank entries.
    fn parse_list(name: &str, default: &str) -> Vec<String> {
        env::var(name)
            .unwrap_or_else(|_| default.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Admission
            allowed_origins: vec!["http://127.0.0.1:62052".to_string()],
            max_content_length: 1000,
            // Rate limiting
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 10,
            trusted_proxies: vec![],
            // Mail
            mail_transport: TransportKind::Log,
            mail_from: "noreply@localhost".to_string(),
            mail_to: "inbox@localhost".to_string(),
            mail_subject: "Neue Kundenanfrage über das Kontaktformular".to_string(),
            mail_timeout: Duration::from_secs(10),
            smtp_url: "smtp://localhost:25".to_string(),
            smtp_username: None,
            smtp_password: None,
            template_path: PathBuf::from("system/templates/formsubmit.html"),
            // Observability
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: 9090,
        }
    }
}
