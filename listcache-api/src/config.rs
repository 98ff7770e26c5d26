//! API Configuration Module
//!
//! Configuration for the cache backend, the query defaults and the HTTP
//! listener. Values are loaded from `LISTCACHE_*` environment variables with
//! development-friendly defaults; the Redis backend additionally requires an
//! endpoint and a secret identifier.

use std::net::SocketAddr;
use std::str::FromStr;

use listcache_core::{ConfigError, DistanceUnit, DEFAULT_SEARCH_RADIUS};
use listcache_storage::{QueryDefaults, DEFAULT_GEO_INDEX_KEY};

// ============================================================================
// ENUMS
// ============================================================================

/// Which cache store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    /// Process-local store; contents vanish with the process.
    Memory,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(invalid("LISTCACHE_CACHE_BACKEND", other, "expected redis or memory")),
        }
    }
}

/// Where cache credentials are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// The secret id names an environment variable holding the document.
    Env,
    /// The secret id is a path to a file holding the document.
    File,
}

impl FromStr for SecretSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(SecretSource::Env),
            "file" => Ok(SecretSource::File),
            other => Err(invalid("LISTCACHE_SECRET_SOURCE", other, "expected env or file")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(invalid("LISTCACHE_LOG_FORMAT", other, "expected pretty or json")),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    // ========================================================================
    // Cache store
    // ========================================================================
    pub cache_backend: CacheBackend,

    /// Hostname of the Redis endpoint. Required for the Redis backend.
    pub cache_endpoint: Option<String>,

    pub cache_port: u16,

    /// Connect with `rediss://`.
    pub cache_tls: bool,

    /// Key of the sorted set holding the geospatial index.
    pub geo_index_key: String,

    /// Identifier of the credential document. Required for the Redis backend.
    pub secret_id: Option<String>,

    pub secret_source: SecretSource,

    /// Run an index reconciliation pass before serving.
    pub reconcile_on_start: bool,

    // ========================================================================
    // Query defaults
    // ========================================================================
    pub default_radius: f64,

    pub default_unit: DistanceUnit,

    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,

    pub port: u16,

    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cache_backend: CacheBackend::Redis,
            cache_endpoint: None,
            cache_port: 6379,
            cache_tls: true,
            geo_index_key: DEFAULT_GEO_INDEX_KEY.to_string(),
            secret_id: None,
            secret_source: SecretSource::Env,
            reconcile_on_start: false,
            default_radius: DEFAULT_SEARCH_RADIUS,
            default_unit: DistanceUnit::Miles,
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LISTCACHE_CACHE_BACKEND`: `redis` or `memory` (default: redis)
    /// - `LISTCACHE_CACHE_ENDPOINT`: Redis hostname (required for redis)
    /// - `LISTCACHE_CACHE_PORT`: Redis port (default: 6379)
    /// - `LISTCACHE_CACHE_TLS`: "true" or "false" (default: true)
    /// - `LISTCACHE_GEO_INDEX_KEY`: geospatial index key (default: properties:geo)
    /// - `LISTCACHE_SECRET_ID`: credential document id (required for redis)
    /// - `LISTCACHE_SECRET_SOURCE`: `env` or `file` (default: env)
    /// - `LISTCACHE_RECONCILE_ON_START`: "true" or "false" (default: false)
    /// - `LISTCACHE_DEFAULT_RADIUS`: search radius when omitted (default: 25)
    /// - `LISTCACHE_DEFAULT_UNIT`: `m`, `km`, `mi` or `ft` (default: mi)
    /// - `LISTCACHE_API_BIND`: listen address (default: 0.0.0.0)
    /// - `PORT` or `LISTCACHE_API_PORT`: listen port (default: 3000)
    /// - `LISTCACHE_LOG_FORMAT`: `pretty` or `json` (default: pretty)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cache_backend = match var("LISTCACHE_CACHE_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.cache_backend,
        };

        let cache_port = match var("LISTCACHE_CACHE_PORT") {
            Some(v) => parse_number("LISTCACHE_CACHE_PORT", &v)?,
            None => defaults.cache_port,
        };

        let cache_tls = var("LISTCACHE_CACHE_TLS")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.cache_tls);

        let secret_source = match var("LISTCACHE_SECRET_SOURCE") {
            Some(v) => v.parse()?,
            None => defaults.secret_source,
        };

        let reconcile_on_start = var("LISTCACHE_RECONCILE_ON_START")
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(defaults.reconcile_on_start);

        let default_radius = match var("LISTCACHE_DEFAULT_RADIUS") {
            Some(v) => {
                let radius: f64 = parse_number("LISTCACHE_DEFAULT_RADIUS", &v)?;
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(invalid("LISTCACHE_DEFAULT_RADIUS", &v, "must be positive"));
                }
                radius
            }
            None => defaults.default_radius,
        };

        let default_unit = match var("LISTCACHE_DEFAULT_UNIT") {
            Some(v) => DistanceUnit::from_str(&v)
                .map_err(|e| invalid("LISTCACHE_DEFAULT_UNIT", &v, &e.to_string()))?,
            None => defaults.default_unit,
        };

        let port = match var("PORT").or_else(|| var("LISTCACHE_API_PORT")) {
            Some(v) => parse_number("PORT", &v)?,
            None => defaults.port,
        };

        let log_format = match var("LISTCACHE_LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => defaults.log_format,
        };

        let config = Self {
            cache_backend,
            cache_endpoint: var("LISTCACHE_CACHE_ENDPOINT"),
            cache_port,
            cache_tls,
            geo_index_key: var("LISTCACHE_GEO_INDEX_KEY").unwrap_or(defaults.geo_index_key),
            secret_id: var("LISTCACHE_SECRET_ID"),
            secret_source,
            reconcile_on_start,
            default_radius,
            default_unit,
            bind_host: var("LISTCACHE_API_BIND").unwrap_or(defaults.bind_host),
            port,
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_backend == CacheBackend::Redis {
            if self.cache_endpoint.is_none() {
                return Err(ConfigError::MissingRequired {
                    field: "LISTCACHE_CACHE_ENDPOINT".to_string(),
                });
            }
            if self.secret_id.is_none() {
                return Err(ConfigError::MissingRequired {
                    field: "LISTCACHE_SECRET_ID".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            radius: self.default_radius,
            unit: self.default_unit,
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| invalid("LISTCACHE_API_BIND", &addr, &e.to_string()))
    }
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(field, value, "not a valid number"))
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
