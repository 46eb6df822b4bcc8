use crate::job::JobStatus;

/// Failure taxonomy shared by every layer of the relay.
///
/// Upstream and poller failures propagate unchanged up to the HTTP facade,
/// which maps each variant to the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Authentication with upstream failed: {0}")]
    Auth(String),

    #[error("Failed to submit image generation request: {0}")]
    Submit(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Failed to generate image: {0}")]
    Sample(String),

    #[error("Failed to retrieve generation status: {message}")]
    Status {
        request_id: Option<String>,
        message: String,
    },

    #[error("Request timeout: generation {request_id} did not complete within {timeout_secs}s")]
    Timeout { request_id: String, timeout_secs: u64 },

    #[error("Service not initialized")]
    ServiceNotInitialized,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Upstream request id associated with the failure, when one was assigned.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            CoreError::Status { request_id, .. } => request_id.as_deref(),
            CoreError::Timeout { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Auth(_) => "AUTH_ERROR",
            CoreError::Submit(_) => "SUBMIT_ERROR",
            CoreError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            CoreError::Sample(_) => "SAMPLE_ERROR",
            CoreError::Status { .. } => "STATUS_ERROR",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::ServiceNotInitialized => "SERVICE_NOT_INITIALIZED",
            CoreError::Transport(_) => "TRANSPORT_ERROR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::InvalidTransition { .. } | CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
