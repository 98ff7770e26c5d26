//! listcache API - HTTP layer for the property listing cache
//!
//! Serves radius search and detail lookup over the cache, ingests
//! change-stream batches, and exposes health, metrics and OpenAPI endpoints.
//! The cache store, the query engine and the change processor live in
//! `listcache-storage`; this crate wires them to axum.

pub mod config;
pub mod credentials;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

pub use config::{ApiConfig, CacheBackend, LogFormat, SecretSource};
pub use credentials::{
    credential_source, CacheCredentials, CredentialSource, EnvCredentialSource,
    FileCredentialSource,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::{create_api_router, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN};
pub use state::{connect_cache, AppState};
pub use types::*;
