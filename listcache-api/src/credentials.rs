//! Cache credential bootstrap.
//!
//! Credentials are resolved once at process start from a secret document of
//! the form `{"username": "...", "password": "..."}`. Any failure here is
//! fatal: the service cannot answer queries or apply changes without them.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use listcache_core::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::SecretSource;

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Username and password for the cache store.
#[derive(Clone)]
pub struct CacheCredentials {
    pub username: String,
    password: SecretString,
}

impl CacheCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password: String = password.into();
        Self {
            username: username.into(),
            password: SecretString::new(password.into_boxed_str()),
        }
    }

    /// Expose the password (only for building the connection URL).
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Parse a secret document.
    pub fn from_document(secret_id: &str, document: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct SecretDocument {
            username: String,
            password: String,
        }

        let parsed: SecretDocument =
            serde_json::from_str(document).map_err(|e| ConfigError::CredentialResolution {
                secret_id: secret_id.to_string(),
                reason: format!("secret document is not valid: {}", e),
            })?;
        Ok(Self::new(parsed.username, parsed.password))
    }
}

impl fmt::Debug for CacheCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// Resolves cache credentials from a secret identifier.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self, secret_id: &str) -> Result<CacheCredentials, ConfigError>;

    fn source_name(&self) -> &'static str;
}

/// The secret id names an environment variable holding the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialSource;

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn resolve(&self, secret_id: &str) -> Result<CacheCredentials, ConfigError> {
        let document = std::env::var(secret_id).map_err(|e| ConfigError::CredentialResolution {
            secret_id: secret_id.to_string(),
            reason: format!("environment variable not readable: {}", e),
        })?;
        CacheCredentials::from_document(secret_id, &document)
    }

    fn source_name(&self) -> &'static str {
        "env"
    }
}

/// The secret id is a path, optionally relative to a base directory
/// (for mounted secret volumes).
#[derive(Debug, Clone, Default)]
pub struct FileCredentialSource {
    base_dir: Option<PathBuf>,
}

impl FileCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn path_for(&self, secret_id: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(secret_id),
            None => PathBuf::from(secret_id),
        }
    }
}

#[async_trait]
impl CredentialSource for FileCredentialSource {
    async fn resolve(&self, secret_id: &str) -> Result<CacheCredentials, ConfigError> {
        let path = self.path_for(secret_id);
        let document = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ConfigError::CredentialResolution {
                secret_id: secret_id.to_string(),
                reason: format!("cannot read {}: {}", path.display(), e),
            }
        })?;
        CacheCredentials::from_document(secret_id, document.trim())
    }

    fn source_name(&self) -> &'static str {
        "file"
    }
}

/// Source for the configured secret backend.
pub fn credential_source(source: SecretSource) -> Box<dyn CredentialSource> {
    match source {
        SecretSource::Env => Box::new(EnvCredentialSource),
        SecretSource::File => Box::new(FileCredentialSource::new()),
    }
}
