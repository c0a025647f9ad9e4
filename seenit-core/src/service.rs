//! Per-upload pipeline: fingerprint the bytes, then run the protocol the
//! service was built for.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cache::DedupCache;
use crate::error::{Result, SeenError};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::geocode::ReverseGeocoder;
use crate::gps::extract_coordinates;
use crate::location::LocationRecord;

/// Which protocol a deployment runs. Chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Membership only: answer whether the content was seen before.
    #[default]
    Dedup,
    /// Resolve the image's location once and cache it under its fingerprint.
    ResolveAndCache,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dedup => "dedup",
            Self::ResolveAndCache => "resolve_and_cache",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown cache mode '{0}' (expected 'dedup' or 'resolve')")]
pub struct UnknownCacheMode(pub String);

impl FromStr for CacheMode {
    type Err = UnknownCacheMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dedup" => Ok(Self::Dedup),
            "resolve" | "resolve_and_cache" => Ok(Self::ResolveAndCache),
            _ => Err(UnknownCacheMode(s.to_string())),
        }
    }
}

/// Enrichment step: EXIF coordinates, then a reverse geocode lookup.
#[derive(Clone)]
pub struct Enricher {
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { geocoder }
    }

    pub async fn locate(&self, bytes: &[u8]) -> Result<LocationRecord> {
        let coords = extract_coordinates(bytes).ok_or(SeenError::NoCoordinates)?;
        debug!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            provider = self.geocoder.provider(),
            "Resolving coordinates"
        );
        self.geocoder.reverse(coords).await
    }
}

enum Strategy {
    Dedup,
    ResolveAndCache(Enricher),
}

/// Result of processing one upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Dedup {
        fingerprint: Fingerprint,
        unique: bool,
    },
    Located {
        fingerprint: Fingerprint,
        location: LocationRecord,
    },
}

impl UploadOutcome {
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Dedup { fingerprint, .. } | Self::Located { fingerprint, .. } => *fingerprint,
        }
    }
}

pub struct UploadService {
    cache: DedupCache,
    strategy: Strategy,
}

impl UploadService {
    /// Service answering only "seen before?".
    pub fn dedup(cache: DedupCache) -> Self {
        Self {
            cache,
            strategy: Strategy::Dedup,
        }
    }

    /// Service resolving and caching each image's location.
    pub fn resolve_and_cache(cache: DedupCache, enricher: Enricher) -> Self {
        Self {
            cache,
            strategy: Strategy::ResolveAndCache(enricher),
        }
    }

    pub fn mode(&self) -> CacheMode {
        match self.strategy {
            Strategy::Dedup => CacheMode::Dedup,
            Strategy::ResolveAndCache(_) => CacheMode::ResolveAndCache,
        }
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    #[instrument(level = "info", skip_all, fields(size = bytes.len(), mode = %self.mode()))]
    pub async fn process(&self, bytes: &[u8]) -> Result<UploadOutcome> {
        let fp = fingerprint(bytes);

        let outcome = match &self.strategy {
            Strategy::Dedup => {
                let unique = self.cache.check_and_record(fp).await?;
                UploadOutcome::Dedup {
                    fingerprint: fp,
                    unique,
                }
            }
            Strategy::ResolveAndCache(enricher) => {
                let location = self.cache.resolve(fp, || enricher.locate(bytes)).await?;
                UploadOutcome::Located {
                    fingerprint: fp,
                    location,
                }
            }
        };

        info!(fingerprint = %fp, ?outcome, "Processed upload");
        Ok(outcome)
    }
}

impl fmt::Debug for UploadService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadService")
            .field("mode", &self.mode())
            .field("cache", &self.cache)
            .finish()
    }
}
