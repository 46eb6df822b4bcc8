//! Typed upstream contract.
//!
//! [`UpstreamClient`] is the seam the pipeline and poller depend on. The
//! HTTP implementation, [`IdeogramClient`], maps every low-level
//! [`UpstreamApiError`] onto the relay's [`CoreError`] taxonomy so callers
//! never see transport details.

use async_trait::async_trait;
use relay_core::error::CoreError;
use relay_core::quota::{classify_sample_rejection, is_weekly_limit, WEEKLY_LIMIT_MARKER};
use relay_core::session::Session;

use crate::api::{IdeogramApi, UpstreamApiError};
use crate::messages::{
    SampleRequest, SubmitEventRequest, SubmitMetadata, GENERATION_PAGE_PATH, USER_AGENT,
};

/// Snapshot of one generation's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub completion_percentage: f64,
    pub is_completed: bool,
    /// Generated asset ids in upstream order. Empty until completed.
    pub asset_ids: Vec<String>,
}

/// Authenticated operations against the upstream service.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Authenticate and establish the process-wide session.
    async fn login(&self) -> Result<Session, CoreError>;

    /// Announce a new generation for the session's user.
    async fn submit(&self, session: &Session) -> Result<(), CoreError>;

    /// Start a generation and return the upstream request id.
    async fn sample(&self, prompt: &str, session: &Session) -> Result<String, CoreError>;

    /// Fetch the progress of a running generation.
    async fn check_status(&self, request_id: &str, org_id: &str)
        -> Result<StatusReport, CoreError>;
}

/// Per-deployment values sent along with login and submit.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Reported in the submit metadata.
    pub location: String,
    /// Sent with login when configured.
    pub external_photo_url: Option<String>,
}

/// [`UpstreamClient`] backed by the upstream HTTP API.
pub struct IdeogramClient {
    api: IdeogramApi,
    settings: ClientSettings,
}

impl IdeogramClient {
    pub fn new(api: IdeogramApi, settings: ClientSettings) -> Self {
        Self { api, settings }
    }
}

#[async_trait]
impl UpstreamClient for IdeogramClient {
    async fn login(&self) -> Result<Session, CoreError> {
        let response = self
            .api
            .login(self.settings.external_photo_url.as_deref())
            .await
            .map_err(|e| CoreError::Auth(e.to_string()))?;

        let user = response
            .user_model
            .ok_or_else(|| CoreError::Auth("login response has no user_model".to_string()))?;

        let session = Session::from_login(user.user_id, user.display_handle, user.organization_id)?;
        tracing::info!(
            user_id = %session.user_id,
            user_handle = %session.user_handle,
            org_id = %session.org_id,
            "Logged in to upstream",
        );
        Ok(session)
    }

    async fn submit(&self, session: &Session) -> Result<(), CoreError> {
        let metadata = SubmitMetadata {
            path: GENERATION_PAGE_PATH,
            triggered_utc_time: chrono::Utc::now().timestamp_millis(),
            user_agent: USER_AGENT,
            is_mobile_layout: false,
            user_handle: &session.user_handle,
            user_id: &session.user_id,
            session_id: &session.session_id,
            location: &self.settings.location,
            generation_in_progress: false,
        };
        let request = SubmitEventRequest::generation(&metadata)
            .map_err(|e| CoreError::Submit(e.to_string()))?;

        let response = self
            .api
            .submit_event(&session.org_id, &request)
            .await
            .map_err(|e| CoreError::Submit(e.to_string()))?;

        if !response.success {
            return Err(CoreError::Submit("upstream reported failure".to_string()));
        }
        Ok(())
    }

    async fn sample(&self, prompt: &str, session: &Session) -> Result<String, CoreError> {
        let request = SampleRequest::with_defaults(prompt, &session.user_id);

        let response = match self.api.sample(&session.org_id, &request).await {
            Ok(response) => response,
            Err(UpstreamApiError::ApiError { body, .. }) if is_weekly_limit(&body) => {
                return Err(CoreError::QuotaExceeded(WEEKLY_LIMIT_MARKER.to_string()));
            }
            Err(e) => return Err(CoreError::Sample(e.to_string())),
        };

        match response.request_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(classify_sample_rejection(response.message.as_deref())),
        }
    }

    async fn check_status(
        &self,
        request_id: &str,
        org_id: &str,
    ) -> Result<StatusReport, CoreError> {
        let status_error = |message: String| CoreError::Status {
            request_id: Some(request_id.to_string()),
            message,
        };

        let response = self
            .api
            .retrieve_requests(org_id, &[request_id])
            .await
            .map_err(|e| status_error(e.to_string()))?;

        // Prefer the entry matching our id; fall back to the first entry
        // since the upstream does not always echo request ids.
        let entry = response
            .sampling_requests
            .iter()
            .find(|r| r.request_id.as_deref() == Some(request_id))
            .or_else(|| response.sampling_requests.first())
            .ok_or_else(|| status_error("upstream returned no sampling request".to_string()))?;

        Ok(StatusReport {
            completion_percentage: entry.completion_percentage,
            is_completed: entry.is_completed,
            asset_ids: entry
                .responses
                .iter()
                .map(|r| r.response_id.clone())
                .collect(),
        })
    }
}
