//! Handlers for image generation.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use relay_core::prompt::validate_prompt;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

/// Body of `POST /create-image`.
#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    /// A missing prompt is treated as blank and rejected by validation.
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct CreateImageResponse {
    /// Asset URLs in upstream order.
    pub images: Vec<String>,
}

/// POST /create-image
///
/// Runs one prompt through the configured job runner and returns the
/// generated image URLs. Fails with `SERVICE_NOT_INITIALIZED` until the
/// startup login has completed.
///
/// Upstream and queue failures answer 500 with the error code. A blank or
/// over-long prompt answers 400 `VALIDATION_ERROR` and never reaches the
/// runner.
pub async fn create_image(
    State(state): State<AppState>,
    Json(input): Json<CreateImageRequest>,
) -> AppResult<impl IntoResponse> {
    let service = state.service()?;
    let prompt = validate_prompt(&input.prompt)?;

    tracing::info!(
        prompt_chars = prompt.chars().count(),
        queued = state.config.use_queue,
        "Image generation requested",
    );

    let images = service.runner.run(prompt).await?;

    tracing::info!(images = images.len(), "Image generation succeeded");
    Ok(Json(CreateImageResponse { images }))
}
