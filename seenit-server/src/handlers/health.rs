//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// GET /health - Liveness check
///
/// Answers `ok` as long as the process serves HTTP. Does not touch the store.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = String, content_type = "text/plain")
    )
)]
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    #[schema(example = true)]
    pub ready: bool,
    /// Backend holding the known-image set
    #[schema(example = "redis")]
    pub store: &'static str,
    /// Protocol run on uploads
    #[schema(example = "dedup")]
    pub mode: &'static str,
}

/// GET /ready - Kubernetes readiness check
///
/// Pings the known-image store. Returns 503 when it cannot be reached, since
/// every upload depends on it.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Store reachable", body = ReadyResponse),
        (status = 503, description = "Store unreachable", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let store = state.store();
    let ready = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(backend = store.backend_name(), error = %e, "Readiness ping failed");
            false
        }
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            ready,
            store: store.backend_name(),
            mode: state.service.mode().as_str(),
        }),
    )
}
