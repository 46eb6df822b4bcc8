use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Mount image generation routes.
///
/// ```text
/// /create-image    generate images for a prompt (POST)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/create-image", post(handlers::images::create_image))
}
