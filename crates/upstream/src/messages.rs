//! Upstream request and response bodies.
//!
//! All four endpoints speak JSON over HTTPS. Response types are lenient:
//! optional fields default instead of failing, so the client layer can
//! report a precise error (missing identity, missing request id) rather
//! than a generic parse failure.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_photo_url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub user_model: Option<UserModel>,
}

/// Identity block of the login response.
#[derive(Debug, Clone, Deserialize)]
pub struct UserModel {
    pub user_id: Option<String>,
    pub display_handle: Option<String>,
    pub organization_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Submit (generation analytics event)
// ---------------------------------------------------------------------------

/// Event key announcing a new generation.
pub const GENERATION_EVENT_KEY: &str = "V2_GENERATION";

/// Page the upstream web app reports generations from.
pub const GENERATION_PAGE_PATH: &str = "/t/my-images";

/// User agent reported inside the submit metadata and on every call.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Serialize)]
pub struct SubmitEventRequest {
    pub event_key: &'static str,
    /// JSON-encoded [`SubmitMetadata`]; the upstream expects a string here,
    /// not a nested object.
    pub metadata: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMetadata<'a> {
    pub path: &'static str,
    pub triggered_utc_time: i64,
    pub user_agent: &'static str,
    pub is_mobile_layout: bool,
    pub user_handle: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub location: &'a str,
    pub generation_in_progress: bool,
}

impl SubmitEventRequest {
    pub fn generation(metadata: &SubmitMetadata<'_>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_key: GENERATION_EVENT_KEY,
            metadata: serde_json::to_string(metadata)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Sample (start a generation)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SampleRequest<'a> {
    pub prompt: &'a str,
    pub user_id: &'a str,
    pub model_version: &'static str,
    pub use_autoprompt_option: &'static str,
    pub sampling_speed: u32,
    pub style_expert: &'static str,
    pub resolution: Resolution,
    pub color_palette: Vec<PaletteColor>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaletteColor {
    pub color_hex: &'static str,
}

/// Palette sent with every sample request.
const DEFAULT_PALETTE: [&str; 5] = ["#F24B59", "#49D906", "#AED919", "#F2B29B", "#BF1E10"];

impl<'a> SampleRequest<'a> {
    /// Sample request with the relay's fixed generation options.
    pub fn with_defaults(prompt: &'a str, user_id: &'a str) -> Self {
        Self {
            prompt,
            user_id,
            model_version: "V_1_5",
            use_autoprompt_option: "ON",
            sampling_speed: 0,
            style_expert: "AUTO",
            resolution: Resolution {
                width: 1024,
                height: 1024,
            },
            color_palette: DEFAULT_PALETTE
                .iter()
                .map(|&color_hex| PaletteColor { color_hex })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    /// Human-readable reason when no request id was issued.
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Retrieve requests (status)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RetrieveRequestsRequest<'a> {
    pub request_ids: &'a [&'a str],
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRequestsResponse {
    #[serde(default)]
    pub sampling_requests: Vec<SamplingRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub completion_percentage: f64,
    #[serde(default)]
    pub is_completed: bool,
    /// One entry per generated image, in display order.
    #[serde(default)]
    pub responses: Vec<SamplingResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingResponse {
    pub response_id: String,
}
