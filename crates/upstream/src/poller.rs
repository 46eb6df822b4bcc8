//! Completion polling for a running generation.
//!
//! [`Poller::poll_until_complete`] checks the status every
//! [`PollConfig::interval`] and tracks an absolute deadline. Both the
//! status call and the wait between calls are bounded by that deadline, so
//! a slow or unresponsive upstream can never stall the loop past it.

use relay_core::error::CoreError;
use relay_core::polling::{asset_urls, PollConfig};
use tokio::time::Instant;

use crate::client::UpstreamClient;

/// Polls an upstream generation until it completes or times out.
#[derive(Debug, Clone)]
pub struct Poller {
    config: PollConfig,
    asset_base_url: String,
}

impl Poller {
    pub fn new(config: PollConfig, asset_base_url: impl Into<String>) -> Self {
        Self {
            config,
            asset_base_url: asset_base_url.into(),
        }
    }

    /// Poll `request_id` until the upstream reports it completed.
    ///
    /// Returns one asset URL per generated image, in upstream order.
    /// A failed status call is returned immediately (no internal retry);
    /// reaching the deadline yields [`CoreError::Timeout`].
    pub async fn poll_until_complete(
        &self,
        client: &dyn UpstreamClient,
        request_id: &str,
        org_id: &str,
    ) -> Result<Vec<String>, CoreError> {
        let deadline = Instant::now() + self.config.deadline;
        let mut attempt = 0u32;

        loop {
            if Instant::now() >= deadline {
                return Err(self.timed_out(request_id, attempt));
            }
            attempt += 1;

            let report =
                match tokio::time::timeout_at(deadline, client.check_status(request_id, org_id))
                    .await
                {
                    Ok(result) => result?,
                    Err(_) => return Err(self.timed_out(request_id, attempt)),
                };

            tracing::debug!(
                request_id,
                attempt,
                completion_percentage = report.completion_percentage,
                "Generation progress",
            );

            if report.is_completed {
                tracing::info!(
                    request_id,
                    attempt,
                    assets = report.asset_ids.len(),
                    "Generation completed",
                );
                return Ok(asset_urls(&self.asset_base_url, &report.asset_ids));
            }

            let next_poll = (Instant::now() + self.config.interval).min(deadline);
            tokio::time::sleep_until(next_poll).await;
        }
    }

    fn timed_out(&self, request_id: &str, attempts: u32) -> CoreError {
        tracing::warn!(
            request_id,
            attempts,
            deadline_secs = self.config.deadline.as_secs(),
            "Generation timed out",
        );
        CoreError::Timeout {
            request_id: request_id.to_string(),
            timeout_secs: self.config.deadline.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use relay_core::session::Session;

    use super::*;
    use crate::client::StatusReport;

    const BASE: &str = "https://assets.test/response";

    /// Replays scripted status results; once exhausted it keeps reporting
    /// an unfinished generation.
    struct ScriptedClient {
        statuses: Mutex<VecDeque<Result<StatusReport, CoreError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(statuses: Vec<Result<StatusReport, CoreError>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    fn progress(pct: f64) -> Result<StatusReport, CoreError> {
        Ok(StatusReport {
            completion_percentage: pct,
            is_completed: false,
            asset_ids: vec![],
        })
    }

    fn done(ids: &[&str]) -> Result<StatusReport, CoreError> {
        Ok(StatusReport {
            completion_percentage: 100.0,
            is_completed: true,
            asset_ids: ids.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[async_trait]
    impl UpstreamClient for ScriptedClient {
        async fn login(&self) -> Result<Session, CoreError> {
            unimplemented!()
        }

        async fn submit(&self, _session: &Session) -> Result<(), CoreError> {
            unimplemented!()
        }

        async fn sample(&self, _prompt: &str, _session: &Session) -> Result<String, CoreError> {
            unimplemented!()
        }

        async fn check_status(
            &self,
            _request_id: &str,
            _org_id: &str,
        ) -> Result<StatusReport, CoreError> {
            *self.calls.lock().unwrap() += 1;
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| progress(10.0))
        }
    }

    /// Never answers.
    struct HangingClient;

    #[async_trait]
    impl UpstreamClient for HangingClient {
        async fn login(&self) -> Result<Session, CoreError> {
            unimplemented!()
        }

        async fn submit(&self, _session: &Session) -> Result<(), CoreError> {
            unimplemented!()
        }

        async fn sample(&self, _prompt: &str, _session: &Session) -> Result<String, CoreError> {
            unimplemented!()
        }

        async fn check_status(
            &self,
            _request_id: &str,
            _org_id: &str,
        ) -> Result<StatusReport, CoreError> {
            std::future::pending().await
        }
    }

    fn poller() -> Poller {
        Poller::new(PollConfig::default(), BASE)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_urls_in_upstream_order() {
        let client = ScriptedClient::new(vec![progress(30.0), progress(70.0), done(&["a", "b"])]);

        let urls = poller()
            .poll_until_complete(&client, "req-1", "org-1")
            .await
            .unwrap();

        assert_eq!(urls, [format!("{BASE}/a"), format!("{BASE}/b")]);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_one_interval_between_polls() {
        let client = ScriptedClient::new(vec![progress(30.0), progress(70.0), done(&["a"])]);
        let started = Instant::now();

        poller()
            .poll_until_complete(&client, "req-1", "org-1")
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_request_id() {
        let client = ScriptedClient::new(vec![]);
        let started = Instant::now();

        let result = poller().poll_until_complete(&client, "req-9", "org-1").await;

        assert_matches!(
            result,
            Err(CoreError::Timeout { ref request_id, timeout_secs: 40 }) if request_id == "req-9"
        );
        let config = PollConfig::default();
        assert!(started.elapsed() <= config.deadline + config.interval);
        assert_eq!(client.calls(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_status_call_is_bounded_by_deadline() {
        let started = Instant::now();
        let config = PollConfig {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(5),
        };

        let result = Poller::new(config, BASE)
            .poll_until_complete(&HangingClient, "req-2", "org-1")
            .await;

        assert_matches!(result, Err(CoreError::Timeout { .. }));
        assert!(started.elapsed() <= config.deadline + config.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn status_failure_propagates_without_retry() {
        let client = ScriptedClient::new(vec![
            progress(20.0),
            Err(CoreError::Status {
                request_id: Some("req-3".into()),
                message: "connection reset".into(),
            }),
            done(&["never"]),
        ]);

        let result = poller().poll_until_complete(&client, "req-3", "org-1").await;

        assert_matches!(result, Err(CoreError::Status { .. }));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_on_first_poll_does_not_wait() {
        let client = ScriptedClient::new(vec![done(&[])]);
        let started = Instant::now();

        let urls = poller()
            .poll_until_complete(&client, "req-4", "org-1")
            .await
            .unwrap();

        assert!(urls.is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
