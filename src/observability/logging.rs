//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//!
//! `RUST_LOG` takes precedence over `observability.log_level`. JSON output is
//! enabled with `observability.json_logging`.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("POST", "/api/admin/certificate", serial = %serial);
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            admin_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            admin_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.log_level, e)))?;

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = if config.json_logging {
        builder.json().with_current_span(true).with_span_list(false).try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| Error::config(format!("Failed to install tracing subscriber: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_type = "sqlite",
        storage_backend = ?config.storage.backend,
        verify_url = %config.qr.verify_url(),
        token_expiry_seconds = config.auth.token_expiry_seconds,
        metrics_enabled = %config.observability.enable_metrics,
        "Certificate registry configuration"
    );

    if config.auth.uses_default_secret() {
        tracing::warn!("Using the built-in JWT secret; set CERTREG__AUTH__JWT_SECRET in production");
    }
}
