//! In-memory upstream used by the pipeline and runner tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_core::error::CoreError;
use relay_core::polling::PollConfig;
use relay_core::session::Session;
use relay_upstream::client::{StatusReport, UpstreamClient};
use relay_upstream::poller::Poller;
use tokio::time::Instant;

use crate::generation::GenerationPipeline;

#[derive(Default)]
pub struct FakeUpstream {
    pub fail_submit: bool,
    pub sample_error: Option<CoreError>,
    pub never_completes: bool,
    /// How long each status call takes.
    pub status_delay: Duration,
    pub(crate) submits: Mutex<Vec<Instant>>,
    pub(crate) prompts: Mutex<Vec<String>>,
    pub(crate) completed_status_calls: AtomicUsize,
}

impl FakeUpstream {
    /// Instants at which each job was dispatched (submit called).
    pub fn dispatch_times(&self) -> Vec<Instant> {
        self.submits.lock().unwrap().clone()
    }

    /// Prompts in the order their sample calls arrived.
    pub fn sampled_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn sample_calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Status calls that ran to the end rather than being dropped mid-wait.
    pub fn completed_status_calls(&self) -> usize {
        self.completed_status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn login(&self) -> Result<Session, CoreError> {
        Ok(session())
    }

    async fn submit(&self, _session: &Session) -> Result<(), CoreError> {
        self.submits.lock().unwrap().push(Instant::now());
        if self.fail_submit {
            return Err(CoreError::Submit("upstream reported failure".into()));
        }
        Ok(())
    }

    async fn sample(&self, prompt: &str, _session: &Session) -> Result<String, CoreError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        if let Some(err) = &self.sample_error {
            return Err(err.clone());
        }
        Ok(format!("req-{}", prompts.len()))
    }

    async fn check_status(
        &self,
        request_id: &str,
        _org_id: &str,
    ) -> Result<StatusReport, CoreError> {
        tokio::time::sleep(self.status_delay).await;
        self.completed_status_calls.fetch_add(1, Ordering::SeqCst);
        if self.never_completes {
            return Ok(StatusReport {
                completion_percentage: 50.0,
                is_completed: false,
                asset_ids: vec![],
            });
        }
        Ok(StatusReport {
            completion_percentage: 100.0,
            is_completed: true,
            asset_ids: vec![format!("{request_id}-a"), format!("{request_id}-b")],
        })
    }
}

pub fn session() -> Session {
    Session {
        user_id: "user-1".into(),
        user_handle: "artist".into(),
        org_id: "org-1".into(),
        session_id: "sess-1".into(),
    }
}

pub fn pipeline_with(upstream: Arc<FakeUpstream>) -> GenerationPipeline {
    GenerationPipeline::new(
        upstream,
        Arc::new(session()),
        Poller::new(PollConfig::default(), "https://assets.test"),
    )
}
