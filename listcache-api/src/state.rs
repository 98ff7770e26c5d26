//! Shared application state and cache bootstrap.

use std::sync::Arc;
use std::time::Instant;

use listcache_core::{ListcacheError, ListcacheResult, RecordCodec};
use listcache_storage::{
    ChangeProcessor, InMemoryListingCache, IndexReconciler, ListingCache, QueryEngine,
    RedisListingCache, RedisSettings,
};
use tracing::{info, warn};

use crate::config::{ApiConfig, CacheBackend};
use crate::credentials::{credential_source, CacheCredentials};

/// Everything the handlers need, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub cache: Arc<dyn ListingCache>,
    pub engine: QueryEngine,
    pub processor: ChangeProcessor,
    pub reconciler: IndexReconciler,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the query and sync paths over one store.
    pub fn new(config: ApiConfig, cache: Arc<dyn ListingCache>) -> Self {
        let index_key = config.geo_index_key.clone();
        Self {
            engine: QueryEngine::new(cache.clone(), index_key.clone())
                .with_defaults(config.query_defaults()),
            processor: ChangeProcessor::with_cache(
                RecordCodec::default(),
                cache.clone(),
                index_key.clone(),
            ),
            reconciler: IndexReconciler::new(cache.clone(), index_key),
            cache,
            config,
            start_time: Instant::now(),
        }
    }

    /// Resolve credentials, connect the configured backend and build state.
    pub async fn from_config(config: ApiConfig) -> ListcacheResult<Self> {
        let cache = connect_cache(&config).await?;
        Ok(Self::new(config, cache))
    }
}

/// Connect the configured cache backend.
pub async fn connect_cache(config: &ApiConfig) -> ListcacheResult<Arc<dyn ListingCache>> {
    match config.cache_backend {
        CacheBackend::Memory => {
            warn!("Using the in-memory cache; contents are lost on restart");
            Ok(Arc::new(InMemoryListingCache::new()))
        }
        CacheBackend::Redis => {
            config.validate()?;
            let secret_id = config.secret_id.as_deref().unwrap_or_default();
            let source = credential_source(config.secret_source);

            info!(secret_id, source = source.source_name(), "Retrieving cache credentials");
            let credentials = source.resolve(secret_id).await?;
            info!(secret_id, "Retrieved cache credentials");

            let settings = redis_settings(config, &credentials)?;
            info!(endpoint = %settings.endpoint, port = settings.port, tls = settings.tls, "Connecting to cache store");
            let cache = RedisListingCache::connect(&settings).await?;
            info!(endpoint = %settings.endpoint, "Connected to cache store");
            Ok(Arc::new(cache))
        }
    }
}

/// Connection settings for the Redis backend.
pub fn redis_settings(
    config: &ApiConfig,
    credentials: &CacheCredentials,
) -> Result<RedisSettings, ListcacheError> {
    let endpoint = config
        .cache_endpoint
        .clone()
        .ok_or_else(|| listcache_core::ConfigError::MissingRequired {
            field: "LISTCACHE_CACHE_ENDPOINT".to_string(),
        })?;
    Ok(RedisSettings {
        endpoint,
        port: config.cache_port,
        tls: config.cache_tls,
        username: Some(credentials.username.clone()),
        password: Some(credentials.password().to_string()),
    })
}
