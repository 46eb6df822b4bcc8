use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: &'static str,
    /// Whether the startup login has completed.
    pub service_initialized: bool,
    pub queue_enabled: bool,
    pub ssl_enabled: bool,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// GET /health -- reports service readiness. Never touches the upstream.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service_initialized: state.is_initialized(),
        queue_enabled: state.config.use_queue,
        ssl_enabled: state.config.ssl_enabled(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
