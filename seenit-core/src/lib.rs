//! Seenit Core - exact-content image dedup with a lazily filled location cache
//!
//! This crate reduces uploaded bytes to a 64-bit fingerprint and checks that
//! fingerprint against a shared key-value store.
//!
//! # Features
//!
//! - XXH64 content fingerprints ([`fingerprint`])
//! - Pluggable durable store: Redis or in-memory ([`KnownStore`])
//! - Membership protocol: "has this exact image been seen?"
//! - Resolution protocol: compute a derived value once per image and cache it
//! - EXIF GPS extraction and reverse geocoding as the derived value
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seenit_core::{DedupCache, MemoryStore, UploadOutcome, UploadService};
//!
//! # async fn example() -> seenit_core::Result<()> {
//! let service = UploadService::dedup(DedupCache::new(Arc::new(MemoryStore::new())));
//!
//! let outcome = service.process(b"image bytes").await?;
//! assert!(matches!(outcome, UploadOutcome::Dedup { unique: true, .. }));
//!
//! let outcome = service.process(b"image bytes").await?;
//! assert!(matches!(outcome, UploadOutcome::Dedup { unique: false, .. }));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod geocode;
pub mod gps;
pub mod location;
pub mod service;
pub mod store;

// Re-export main types for convenience
pub use cache::{CacheKeys, DedupCache, DEFAULT_OP_TIMEOUT};
pub use error::{Result, SeenError};
pub use fingerprint::{fingerprint, Fingerprint};
pub use geocode::{GeocoderConfig, MockGeocoder, NominatimGeocoder, ReverseGeocoder};
pub use gps::extract_coordinates;
pub use location::{Coordinates, LocationRecord};
pub use service::{CacheMode, Enricher, UnknownCacheMode, UploadOutcome, UploadService};
pub use store::{KnownStore, MemoryStore, StoreError};

#[cfg(feature = "redis")]
pub use store::RedisStore;
