//! API error handling module
//!
//! Maps every failure class to an HTTP status and a JSON `{error, code}` body.
//! No failure is reported as an empty success.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seenit_core::{SeenError, StoreError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload too large - upload exceeds the configured body limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Request ran past the configured request timeout
    #[error("Request timed out")]
    RequestTimeout,

    /// Error from the dedup / enrichment pipeline
    #[error("Pipeline error: {0}")]
    Seen(#[from] SeenError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a payload too large error
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Seen(ref e) => match e {
                // Store failures → 503, or 504 when the store was too slow
                SeenError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                SeenError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,

                // Image carries nothing to resolve → 422
                SeenError::NoCoordinates => StatusCode::UNPROCESSABLE_ENTITY,

                // Upstream geocoder failure → 502
                SeenError::Geocode(_) => StatusCode::BAD_GATEWAY,

                // Internal processing failures → 500
                SeenError::CacheCorrupt { .. } | SeenError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::Seen(ref e) => match e {
                SeenError::Store(StoreError::Timeout(_)) => "STORE_TIMEOUT",
                SeenError::Store(_) => "STORE_UNAVAILABLE",
                SeenError::NoCoordinates => "NO_COORDINATES",
                SeenError::Geocode(_) => "GEOCODE_FAILED",
                SeenError::CacheCorrupt { .. } => "CACHE_CORRUPT",
                SeenError::Serialization(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Pipeline errors may carry backend addresses or upstream bodies
            Self::Seen(ref e) => match e {
                SeenError::Store(StoreError::Timeout(ms)) => {
                    format!("Image store did not respond within {} ms", ms)
                }
                SeenError::Store(_) => "Image store unavailable".to_string(),
                SeenError::NoCoordinates => {
                    "Image has no GPS coordinates in its metadata".to_string()
                }
                SeenError::Geocode(_) => "Reverse geocoding failed".to_string(),
                SeenError::CacheCorrupt { .. } => {
                    "Cached location for this image is unreadable".to_string()
                }
                SeenError::Serialization(_) => "Failed to encode location".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::PayloadTooLarge(_) => "input",
            Self::RequestTimeout => "timeout",
            Self::Seen(ref e) => match e {
                SeenError::Store(_) => "store",
                SeenError::NoCoordinates | SeenError::Geocode(_) => "enrichment",
                SeenError::CacheCorrupt { .. } => "cache_corruption",
                SeenError::Serialization(_) => "internal",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_client_error() {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        } else if matches!(
            status,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ) {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Dependency error"
            );
        } else {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                client_message = %client_message,
                "Server error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
