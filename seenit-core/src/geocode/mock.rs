//! Mock geocoder for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::ReverseGeocoder;
use crate::error::{Result, SeenError};
use crate::location::{Coordinates, LocationRecord};

/// Geocoder that answers every lookup with the same record.
/// WARNING: Do not use in production - it ignores the coordinates!
pub struct MockGeocoder {
    answer: Option<LocationRecord>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new(answer: LocationRecord) -> Self {
        Self {
            answer: Some(answer),
            calls: AtomicUsize::new(0),
        }
    }

    /// A geocoder whose every lookup fails.
    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new(LocationRecord {
            road: Some("Mock Road".into()),
            city: Some("Mockton".into()),
            country: Some("Mockland".into()),
            country_code: Some("mk".into()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ReverseGeocoder for MockGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<LocationRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().ok_or_else(|| {
            SeenError::Geocode(format!(
                "mock geocoder configured to fail ({}, {})",
                coords.latitude, coords.longitude
            ))
        })
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let geocoder = MockGeocoder::default();
        let coords = Coordinates::new(1.0, 2.0);

        let first = geocoder.reverse(coords).await.unwrap();
        let second = geocoder.reverse(coords).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.city.as_deref(), Some("Mockton"));
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let geocoder = MockGeocoder::failing();
        let err = geocoder
            .reverse(Coordinates::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SeenError::Geocode(_)));
        assert_eq!(geocoder.calls(), 1);
    }
}
