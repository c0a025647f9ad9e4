//! OpenStreetMap Nominatim reverse geocoder.
//!
//! Uses the public `/reverse` endpoint at https://nominatim.openstreetmap.org/
//! (or any self-hosted instance with the same API).
//!
//! ## Features
//!
//! - Per-request timeout enforced by the HTTP client
//! - Bounded retry with exponential backoff on transient errors only
//! - Identifying `User-Agent`, required by the public instance's usage policy

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::ReverseGeocoder;
use crate::error::{Result, SeenError};
use crate::location::{Coordinates, LocationRecord};

/// Default Nominatim endpoint.
const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Default timeout for a single request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra attempts after the first one.
const MAX_RETRIES: u32 = 1;

const INITIAL_INTERVAL: Duration = Duration::from_millis(200);

const MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Response body of `/reverse?format=json`.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<LocationRecord>,
    /// Set instead of `address` when nothing is found ("Unable to geocode").
    #[serde(default)]
    error: Option<String>,
}

/// Configuration for the Nominatim client.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// Base URL, without the `/reverse` path.
    pub base_url: String,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("seenit/{}", env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        }
    }
}

/// Nominatim reverse geocoding client.
pub struct NominatimGeocoder {
    client: Client,
    config: GeocoderConfig,
}

impl NominatimGeocoder {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(GeocoderConfig::default())
    }

    /// Create a client with custom configuration.
    #[instrument(level = "debug", skip_all, fields(
        base_url = %config.base_url,
        timeout_ms = config.timeout.as_millis() as u64,
        max_retries = config.max_retries
    ))]
    pub fn with_config(config: GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                SeenError::Geocode(format!("Failed to create HTTP client: {e}"))
            })?;

        info!("Nominatim geocoder created");
        Ok(Self { client, config })
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.config.base_url.trim_end_matches('/'))
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }

    /// Single lookup attempt.
    async fn fetch_once(
        &self,
        coords: Coordinates,
    ) -> std::result::Result<LocationRecord, backoff::Error<SeenError>> {
        let start = Instant::now();

        let response = self
            .client
            .get(self.reverse_url())
            .query(&[
                ("format", "json".to_string()),
                ("lat", format!("{:.6}", coords.latitude)),
                ("lon", format!("{:.6}", coords.longitude)),
            ])
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                if is_transient_error(&e) {
                    warn!(error = %e, latency_ms, "Transient error, will retry");
                    backoff::Error::transient(SeenError::Geocode(format!(
                        "Transient error: {e}"
                    )))
                } else {
                    warn!(error = %e, latency_ms, "Permanent error, aborting");
                    backoff::Error::permanent(SeenError::Geocode(format!(
                        "Reverse geocode request failed: {e}"
                    )))
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let err = SeenError::Geocode(format!("Geocoder returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let body: ReverseResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(SeenError::Geocode(format!(
                "Failed to parse geocoder response: {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        address_from_response(body).map_err(backoff::Error::permanent)
    }
}

fn address_from_response(body: ReverseResponse) -> Result<LocationRecord> {
    match (body.address, body.error) {
        (Some(address), _) => Ok(address),
        (None, Some(message)) => Err(SeenError::Geocode(format!(
            "Geocoder found no address: {message}"
        ))),
        (None, None) => Err(SeenError::Geocode(
            "Geocoder response has no address".into(),
        )),
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    #[instrument(
        level = "info",
        skip(self),
        fields(provider = "nominatim", max_retries = self.config.max_retries)
    )]
    async fn reverse(&self, coords: Coordinates) -> Result<LocationRecord> {
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let max_retries = self.config.max_retries;

        let result = retry_notify(
            self.build_backoff(),
            || {
                let attempts = &attempts;
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    self.fetch_once(coords).await.map_err(|e| match e {
                        backoff::Error::Transient { err, .. } if attempt >= max_retries => {
                            backoff::Error::permanent(err)
                        }
                        other => other,
                    })
                }
            },
            |err: SeenError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await;

        let total_latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(total_latency_ms, "Resolved address"),
            Err(e) => warn!(
                error = %e,
                total_latency_ms,
                attempts = attempts.load(Ordering::SeqCst),
                "Reverse geocode failed"
            ),
        }

        result
    }

    fn provider(&self) -> &'static str {
        "nominatim"
    }
}

/// Check if a reqwest error is transient and should be retried.
pub(crate) fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Check if an HTTP status code indicates a transient error.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
