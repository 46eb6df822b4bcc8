//! Strategy seam between the HTTP facade and the generation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::error::CoreError;

use crate::generation::GenerationPipeline;

/// Executes generation prompts on behalf of HTTP callers.
///
/// Implementations decide scheduling only; each prompt is attempted exactly
/// once and its outcome is returned to the caller that submitted it.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run one prompt to a terminal state and return the asset URLs.
    async fn run(&self, prompt: String) -> Result<Vec<String>, CoreError>;

    /// Stop accepting work and release background resources.
    async fn shutdown(&self);
}

/// Runs each prompt as soon as it arrives, without queueing.
///
/// Concurrent callers race against the upstream; its own rate limits apply.
/// Each generation gets its own task, so a caller that goes away does not
/// abort a job the upstream has already accepted.
pub struct InlineRunner {
    pipeline: Arc<GenerationPipeline>,
}

impl InlineRunner {
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobRunner for InlineRunner {
    async fn run(&self, prompt: String) -> Result<Vec<String>, CoreError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move { pipeline.generate(&prompt).await })
            .await
            .map_err(|e| CoreError::Internal(format!("generation task failed: {e}")))?
    }

    async fn shutdown(&self) {
        tracing::debug!("Inline runner has no background work to stop");
    }
}
