//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Values are read once at startup; there is no hot reload.

use std::str::FromStr;
use std::time::Duration;

use seenit_core::{CacheKeys, CacheMode, GeocoderConfig, UnknownCacheMode};
use thiserror::Error;

/// Configuration errors that abort startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    CacheMode(#[from] UnknownCacheMode),

    #[error("Unknown geocoder '{0}' (expected 'nominatim' or 'mock')")]
    Geocoder(String),

    #[error("Invalid GEOCODER_URL '{url}': {reason}")]
    GeocoderUrl { url: String, reason: String },
}

/// Which reverse geocoder backs resolve mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderKind {
    Nominatim,
    /// Fixed answer, no network. Development only.
    Mock,
}

impl FromStr for GeocoderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominatim" => Ok(Self::Nominatim),
            "mock" | "static" => Ok(Self::Mock),
            other => Err(ConfigError::Geocoder(other.to_string())),
        }
    }
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Host name or IP address to bind (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
    /// Protocol run on uploads (default: dedup)
    pub cache_mode: CacheMode,
    /// Redis URL; unset means the in-memory store
    pub redis_url: Option<String>,
    /// Name of the known-image set (default: images)
    pub known_set_key: String,
    /// Name of the fingerprint -> location map (default: locations)
    pub resolution_map_key: String,
    /// Bound on each store round-trip in milliseconds (default: 2000)
    pub store_timeout_ms: u64,
    /// Reverse geocoder backend (default: nominatim)
    pub geocoder: GeocoderKind,
    /// Geocoder base URL (default: public Nominatim)
    pub geocoder_url: String,
    /// User-Agent sent to the geocoder
    pub geocoder_user_agent: String,
    /// Geocoder request timeout in seconds (default: 10)
    pub geocoder_timeout_secs: u64,
    /// Geocoder retries on transient failure (default: 1)
    pub geocoder_max_retries: u32,
    /// Allowed CORS origins, comma-separated (default: allow all)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 25)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        let geocoder = GeocoderConfig::default();
        let keys = CacheKeys::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cache_mode: CacheMode::Dedup,
            redis_url: None,
            known_set_key: keys.known_set,
            resolution_map_key: keys.resolution_map,
            store_timeout_ms: 2000,
            geocoder: GeocoderKind::Nominatim,
            geocoder_url: geocoder.base_url,
            geocoder_user_agent: geocoder.user_agent,
            geocoder_timeout_secs: geocoder.timeout.as_secs(),
            geocoder_max_retries: geocoder.max_retries,
            allowed_origins: None, // None = allow all
            body_limit_mb: 25,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host);
        let port = env_or("PORT", defaults.port);

        let cache_mode = match std::env::var("CACHE_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => defaults.cache_mode,
        };

        let redis_url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let known_set_key = std::env::var("KNOWN_SET_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .unwrap_or(defaults.known_set_key);

        let resolution_map_key = std::env::var("RESOLUTION_MAP_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .unwrap_or(defaults.resolution_map_key);

        let geocoder = match std::env::var("GEOCODER") {
            Ok(kind) => kind.parse()?,
            Err(_) => defaults.geocoder,
        };

        let geocoder_url = std::env::var("GEOCODER_URL").unwrap_or(defaults.geocoder_url);
        validate_geocoder_url(&geocoder_url)?;

        let geocoder_user_agent =
            std::env::var("GEOCODER_USER_AGENT").unwrap_or(defaults.geocoder_user_agent);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            cache_mode,
            redis_url,
            known_set_key,
            resolution_map_key,
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            geocoder,
            geocoder_url,
            geocoder_user_agent,
            geocoder_timeout_secs: env_or("GEOCODER_TIMEOUT_SECS", defaults.geocoder_timeout_secs),
            geocoder_max_retries: env_or("GEOCODER_MAX_RETRIES", defaults.geocoder_max_retries),
            allowed_origins,
            body_limit_mb: env_or("BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_or("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),
        })
    }

    /// Host and port to bind; the host is resolved at bind time, so names
    /// like `localhost` work as well as literal addresses
    pub fn bind_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn cache_keys(&self) -> CacheKeys {
        CacheKeys {
            known_set: self.known_set_key.clone(),
            resolution_map: self.resolution_map_key.clone(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn geocoder_config(&self) -> GeocoderConfig {
        GeocoderConfig {
            base_url: self.geocoder_url.clone(),
            user_agent: self.geocoder_user_agent.clone(),
            timeout: Duration::from_secs(self.geocoder_timeout_secs),
            max_retries: self.geocoder_max_retries,
            ..Default::default()
        }
    }
}

fn validate_geocoder_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::GeocoderUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}
