//! Application state module
//!
//! Defines shared state accessible across all request handlers, and builds it
//! from configuration at startup.

use std::sync::Arc;

use seenit_core::{
    CacheMode, DedupCache, Enricher, KnownStore, MemoryStore, MockGeocoder, NominatimGeocoder,
    ReverseGeocoder, SeenError, StoreError, UploadService,
};

use crate::config::{Config, GeocoderKind};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Upload pipeline, built for exactly one cache mode
    pub service: Arc<UploadService>,
}

impl AppState {
    pub fn new(service: UploadService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Build the store, geocoder and pipeline described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, SeenError> {
        let store = build_store(config).await?;
        let cache = DedupCache::new(store)
            .with_keys(config.cache_keys())
            .with_op_timeout(config.store_timeout());

        let service = match config.cache_mode {
            CacheMode::Dedup => UploadService::dedup(cache),
            CacheMode::ResolveAndCache => {
                let geocoder = build_geocoder(config)?;
                tracing::info!(provider = geocoder.provider(), "Location enrichment enabled");
                UploadService::resolve_and_cache(cache, Enricher::new(geocoder))
            }
        };

        Ok(Self::new(service))
    }

    pub fn store(&self) -> &Arc<dyn KnownStore> {
        self.service.cache().store()
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn KnownStore>, StoreError> {
    match &config.redis_url {
        Some(url) => {
            tracing::info!("Using Redis known-image store");
            connect_redis(url).await
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Arc<dyn KnownStore>, StoreError> {
    let store = seenit_core::RedisStore::connect(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn KnownStore>, StoreError> {
    Err(StoreError::Connection(
        "REDIS_URL is set but the server was built without the `redis` feature".into(),
    ))
}

fn build_geocoder(config: &Config) -> Result<Arc<dyn ReverseGeocoder>, SeenError> {
    Ok(match config.geocoder {
        GeocoderKind::Nominatim => {
            Arc::new(NominatimGeocoder::with_config(config.geocoder_config())?)
        }
        GeocoderKind::Mock => {
            tracing::warn!("Using mock geocoder - every image resolves to the same address!");
            Arc::new(MockGeocoder::default())
        }
    })
}
