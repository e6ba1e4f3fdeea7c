// Runtime configuration
//
// Per-component configs live next to their components and derive their
// defaults from the environment; this module aggregates them for the
// composition root.

use crate::panels::{PhotoConfig, ResponseConfig, TimestampConfig};
use crate::prompt::PromptConfig;
use crate::stream::StreamConfig;

/// Server base URL shared by the stream and prompt clients.
pub(crate) fn base_url_from_env() -> String {
    std::env::var("WATCHTOWER_BASE_URL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "http://localhost:8080".to_string())
}

/// Dashboard configuration
#[derive(Clone, Debug, Default)]
pub struct DashboardConfig {
    pub stream: StreamConfig,
    pub photo: PhotoConfig,
    pub timestamp: TimestampConfig,
    pub response: ResponseConfig,
    pub prompt: PromptConfig,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Points both HTTP clients at `base_url`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.stream.base_url = base_url.to_string();
        self.prompt.base_url = base_url.to_string();
        self
    }
}
