//! REST client for the upstream HTTP endpoints.
//!
//! Wraps the four upstream calls (login, submit, sample, retrieve
//! requests) using [`reqwest`]. Every call carries the static credentials
//! plus fresh correlation headers; see [`crate::correlation`].

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, REFERER,
};

use crate::correlation::{new_request_id, new_traceparent};
use crate::messages::{
    LoginRequest, LoginResponse, RetrieveRequestsRequest, RetrieveRequestsResponse,
    SampleRequest, SampleResponse, SubmitEventRequest, SubmitResponse, GENERATION_PAGE_PATH,
    USER_AGENT,
};

/// Default upstream origin.
pub const DEFAULT_BASE_URL: &str = "https://ideogram.ai";

/// Header naming the organization a call acts for.
const ORG_HEADER: &str = "x-ideo-org";

/// Length of the HTML excerpt kept when the upstream answers with a page
/// instead of JSON (typically an expired session).
const HTML_SNIPPET_CHARS: usize = 100;

/// Static credentials captured from an authenticated browser session.
#[derive(Clone)]
pub struct UpstreamCredentials {
    /// Value of the `authorization` header (bearer token).
    pub authorization: String,
    /// Value of the `cookie` header.
    pub cookie: String,
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("authorization", &"<redacted>")
            .field("cookie", &"<redacted>")
            .finish()
    }
}

/// HTTP client for the upstream service.
pub struct IdeogramApi {
    client: reqwest::Client,
    base_url: String,
    credentials: UpstreamCredentials,
}

/// Errors from the upstream REST layer.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream returned a non-2xx status code.
    #[error("HTTP Error {status}: {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response carried an HTML page instead of JSON.
    #[error("Unexpected HTML response: {snippet}...")]
    UnexpectedHtml { snippet: String },

    /// A 2xx response carried neither JSON nor HTML.
    #[error("Unexpected response type: {content_type}")]
    UnexpectedContentType { content_type: String },
}

impl IdeogramApi {
    /// Create a new API client.
    ///
    /// * `base_url` - upstream origin, e.g. `https://ideogram.ai`.
    pub fn new(base_url: String, credentials: UpstreamCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Authenticate with the stored credentials.
    ///
    /// Sends `POST /api/account/login`. The response identifies the user
    /// and organization subsequent calls act for.
    pub async fn login(
        &self,
        external_photo_url: Option<&str>,
    ) -> Result<LoginResponse, UpstreamApiError> {
        let body = LoginRequest { external_photo_url };

        let response = self
            .post("/api/account/login", None)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Announce a new generation.
    ///
    /// Sends `POST /api/e/submit`. The upstream web app emits this event
    /// before every sample call.
    pub async fn submit_event(
        &self,
        org_id: &str,
        request: &SubmitEventRequest,
    ) -> Result<SubmitResponse, UpstreamApiError> {
        let response = self
            .post("/api/e/submit", Some(org_id))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start a generation.
    ///
    /// Sends `POST /api/images/sample`. On acceptance the response carries
    /// the request id to poll; otherwise a human-readable message.
    pub async fn sample(
        &self,
        org_id: &str,
        request: &SampleRequest<'_>,
    ) -> Result<SampleResponse, UpstreamApiError> {
        let response = self
            .post("/api/images/sample", Some(org_id))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of one or more generations.
    ///
    /// Sends `POST /api/gallery/retrieve-requests`.
    pub async fn retrieve_requests(
        &self,
        org_id: &str,
        request_ids: &[&str],
    ) -> Result<RetrieveRequestsResponse, UpstreamApiError> {
        let body = RetrieveRequestsRequest { request_ids };

        let response = self
            .post("/api/gallery/retrieve-requests", Some(org_id))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Start a POST with credentials and fresh correlation headers.
    fn post(&self, path: &str, org_id: Option<&str>) -> reqwest::RequestBuilder {
        let request_id = new_request_id();
        tracing::trace!(path, request_id = %request_id, "Upstream call");

        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .headers(self.static_headers())
            .header("x-request-id", request_id)
            .header("traceparent", new_traceparent());

        if let Some(org_id) = org_id {
            builder = builder.header(ORG_HEADER, org_id);
        }
        builder
    }

    fn static_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        if let Ok(value) = HeaderValue::from_str(&self.credentials.authorization) {
            headers.insert(AUTHORIZATION, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.credentials.cookie) {
            headers.insert(COOKIE, value);
        }
        let referer = format!("{}{}", self.base_url, GENERATION_PAGE_PATH);
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        headers
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`UpstreamApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, UpstreamApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UpstreamApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type,
    /// rejecting HTML pages and other content types.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UpstreamApiError> {
        let response = Self::ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("application/json") {
            Ok(response.json::<T>().await?)
        } else if content_type.contains("text/html") {
            let html = response.text().await?;
            Err(UpstreamApiError::UnexpectedHtml {
                snippet: html.chars().take(HTML_SNIPPET_CHARS).collect(),
            })
        } else {
            Err(UpstreamApiError::UnexpectedContentType { content_type })
        }
    }
}
