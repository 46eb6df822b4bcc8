//! Submit -> sample -> poll sequence for a single prompt.

use std::sync::Arc;

use relay_core::error::CoreError;
use relay_core::job::Job;
use relay_core::session::Session;
use relay_upstream::client::UpstreamClient;
use relay_upstream::poller::Poller;

/// Runs generation jobs against the upstream for one authenticated session.
pub struct GenerationPipeline {
    client: Arc<dyn UpstreamClient>,
    session: Arc<Session>,
    poller: Poller,
}

impl GenerationPipeline {
    pub fn new(client: Arc<dyn UpstreamClient>, session: Arc<Session>, poller: Poller) -> Self {
        Self {
            client,
            session,
            poller,
        }
    }

    /// Generate images for `prompt` and return their URLs.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>, CoreError> {
        let mut job = Job::new(prompt);
        self.execute(&mut job).await
    }

    /// Drive `job` from Pending to a terminal state.
    ///
    /// The job is left in the state matching the outcome: Completed with
    /// its URLs, TimedOut on deadline, Failed on any other error.
    pub async fn execute(&self, job: &mut Job) -> Result<Vec<String>, CoreError> {
        tracing::info!(job_id = %job.id, "Generation job started");

        let result = self.drive(job).await;
        match &result {
            Ok(urls) => tracing::info!(
                job_id = %job.id,
                request_id = job.request_id().unwrap_or_default(),
                images = urls.len(),
                "Generation job completed",
            ),
            Err(e) => tracing::warn!(
                job_id = %job.id,
                request_id = job.request_id().unwrap_or_default(),
                status = %job.status(),
                error = %e,
                "Generation job failed",
            ),
        }
        result
    }

    async fn drive(&self, job: &mut Job) -> Result<Vec<String>, CoreError> {
        if let Err(e) = self.client.submit(&self.session).await {
            job.fail(e.to_string())?;
            return Err(e);
        }
        job.start()?;
        tracing::debug!(job_id = %job.id, status = %job.status(), "Generation submitted");

        let request_id = match self.client.sample(&job.prompt, &self.session).await {
            Ok(id) => id,
            Err(e) => {
                job.fail(e.to_string())?;
                return Err(e);
            }
        };
        job.assign_request_id(request_id.as_str())?;
        tracing::info!(job_id = %job.id, request_id = %request_id, "Upstream accepted sample");

        let outcome = self
            .poller
            .poll_until_complete(self.client.as_ref(), &request_id, &self.session.org_id)
            .await;

        match outcome {
            Ok(urls) => {
                job.complete(urls.clone())?;
                Ok(urls)
            }
            Err(e @ CoreError::Timeout { .. }) => {
                job.time_out()?;
                Err(e)
            }
            Err(e) => {
                job.fail(e.to_string())?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use relay_core::job::JobStatus;

    use super::*;
    use crate::test_support::{pipeline_with, FakeUpstream};

    #[tokio::test(start_paused = true)]
    async fn completed_job_has_request_id_and_urls() {
        let upstream = Arc::new(FakeUpstream::default());
        let pipeline = pipeline_with(Arc::clone(&upstream));
        let mut job = Job::new("a red fox");

        let urls = pipeline.execute(&mut job).await.unwrap();

        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.request_id(), Some("req-1"));
        assert_eq!(urls, ["https://assets.test/req-1-a", "https://assets.test/req-1-b"]);
        assert_eq!(job.result().unwrap(), urls.as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_failure_fails_pending_job() {
        let upstream = Arc::new(FakeUpstream {
            fail_submit: true,
            ..Default::default()
        });
        let pipeline = pipeline_with(Arc::clone(&upstream));
        let mut job = Job::new("p");

        let result = pipeline.execute(&mut job).await;

        assert_matches!(result, Err(CoreError::Submit(_)));
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(upstream.sample_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_rejection_fails_job_without_request_id() {
        let upstream = Arc::new(FakeUpstream {
            sample_error: Some(CoreError::QuotaExceeded("weekly".into())),
            ..Default::default()
        });
        let pipeline = pipeline_with(upstream);
        let mut job = Job::new("p");

        let result = pipeline.execute(&mut job).await;

        assert_matches!(result, Err(CoreError::QuotaExceeded(_)));
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.request_id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_deadline_times_job_out() {
        let upstream = Arc::new(FakeUpstream {
            never_completes: true,
            ..Default::default()
        });
        let pipeline = pipeline_with(upstream);
        let mut job = Job::new("p");

        let result = pipeline.execute(&mut job).await;

        assert_matches!(result, Err(CoreError::Timeout { .. }));
        assert_eq!(job.status(), JobStatus::TimedOut);
        assert_eq!(job.request_id(), Some("req-1"));
    }
}
