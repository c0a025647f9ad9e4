//! Upload handler
//!
//! Handles POST /upload/{path}: fingerprints the raw body and answers according
//! to the configured cache mode.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use seenit_core::UploadOutcome;

use crate::error::ApiError;
use crate::state::AppState;

/// Check an uploaded image against everything seen before
///
/// The request body is the raw image. `path` is a client-chosen name that is
/// only logged.
///
/// - **dedup** mode answers `true` if the bytes were never seen before and
///   `false` otherwise, as `text/plain`.
/// - **resolve_and_cache** mode answers the image's reverse-geocoded address,
///   resolved once per distinct image. JSON by default, or a single
///   comma-separated line when the client sends `Accept: text/plain`.
#[utoipa::path(
    post,
    path = "/upload/{path}",
    tag = "Upload",
    params(
        ("path" = String, Path, description = "Client-supplied upload name (logged only)")
    ),
    request_body(
        content_type = "application/octet-stream",
        description = "Raw image bytes"
    ),
    responses(
        (status = 200, description = "`true`/`false` as text/plain in dedup mode, a LocationRecord (JSON, or text/plain on request) in resolve_and_cache mode"),
        (status = 400, description = "Body could not be read"),
        (status = 408, description = "Request ran past the request timeout"),
        (status = 413, description = "Body exceeds the configured limit"),
        (status = 422, description = "Image carries no GPS coordinates"),
        (status = 500, description = "Cached location is corrupt"),
        (status = 502, description = "Reverse geocoder failed"),
        (status = 503, description = "Known-image store unavailable"),
        (status = 504, description = "Known-image store timed out")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(rejection.body_text())
        } else {
            ApiError::bad_request(format!("Failed to read body: {}", rejection.body_text()))
        }
    })?;

    tracing::debug!(path = %path, size = bytes.len(), "Upload received");

    match state.service.process(&bytes).await? {
        UploadOutcome::Dedup { unique, .. } => Ok(unique.to_string().into_response()),
        UploadOutcome::Located { location, .. } if wants_text(&headers) => {
            Ok(location.to_string().into_response())
        }
        UploadOutcome::Located { location, .. } => Ok(Json(location).into_response()),
    }
}

fn wants_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/plain") && !accept.contains("json"))
}
