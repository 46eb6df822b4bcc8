//! Poll scheduling constants and asset URL construction.

use std::time::Duration;

/// Time between two status checks of a running generation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Overall deadline for a generation to complete.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(40);

/// Where the upstream serves lossless renders, keyed by asset id.
pub const DEFAULT_ASSET_BASE_URL: &str = "https://ideogram.ai/assets/image/lossless/response";

/// Interval and deadline for one polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

/// Build the public URL of one generated asset.
pub fn asset_url(base_url: &str, asset_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), asset_id)
}

/// Map asset ids to URLs, preserving the given order.
pub fn asset_urls(base_url: &str, asset_ids: &[String]) -> Vec<String> {
    asset_ids.iter().map(|id| asset_url(base_url, id)).collect()
}
