//! Tracing subscriber initialization.
//!
//! Logs are written to stdout, either human-readable or as one JSON object per
//! line for log shippers. Filtering follows `RUST_LOG` when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "listcache_api=debug,listcache_storage=info,tower_http=info,info";

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "listcache-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_format: LogFormat::Pretty,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn with_log_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails because
/// the global subscriber is already set.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "listcache-api");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.default_filter.contains("listcache_api"));
    }

    #[test]
    fn test_with_log_format() {
        let config = TelemetryConfig::default().with_log_format(LogFormat::Json);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default();
        // Whichever test in this binary installs the subscriber first wins.
        let _ = init_tracer(&config);
        assert!(init_tracer(&config).is_err());
    }
}
