use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses of
/// the form `{error, code, requestId?}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `relay_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The client exhausted its request budget.
    #[error("Too many requests")]
    TooManyRequests,
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut request_id = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::InvalidTransition { .. } | CoreError::Internal(_) => {
                    tracing::error!(error = %core, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
                other => {
                    request_id = other.request_id().map(str::to_string);
                    tracing::warn!(
                        code = other.code(),
                        request_id = request_id.as_deref().unwrap_or_default(),
                        error = %other,
                        "Image generation failed",
                    );
                    (StatusCode::INTERNAL_SERVER_ERROR, other.code(), other.to_string())
                }
            },

            // --- HTTP-specific errors ---
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests, please try again later".to_string(),
            ),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(id) = request_id {
            body["requestId"] = json!(id);
        }

        (status, axum::Json(body)).into_response()
    }
}
