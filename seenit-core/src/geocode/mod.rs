//! Reverse geocoding: coordinates in, postal address out.
//!
//! - [`NominatimGeocoder`] - OpenStreetMap Nominatim over HTTPS, with timeout
//!   and a bounded retry on transient failures
//! - [`MockGeocoder`] - fixed answer, for tests and offline development

mod mock;
mod nominatim;

pub use mock::MockGeocoder;
pub use nominatim::{GeocoderConfig, NominatimGeocoder};

use async_trait::async_trait;

use crate::error::Result;
use crate::location::{Coordinates, LocationRecord};

/// Resolves coordinates to an address.
///
/// Implementations must be thread-safe (`Send + Sync`). A failure is returned
/// as [`SeenError::Geocode`](crate::SeenError::Geocode).
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coords: Coordinates) -> Result<LocationRecord>;

    /// Provider identifier for logs.
    fn provider(&self) -> &'static str;
}
