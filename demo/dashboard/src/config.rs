use std::fs;
use std::path::Path;

use watchtower_core::DashboardConfig;

/// Load configuration from a TOML file (path via DASHBOARD_CONFIG or
/// ./dashboard.toml), overlaying values onto env-driven defaults.
pub fn load() -> DashboardConfig {
    let default = DashboardConfig::from_env();
    let path = std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard.toml".into());
    let p = Path::new(&path);
    if !p.exists() {
        tracing::info!(target = "dashboard_demo", path = %path, "No TOML config found; using defaults/env");
        return default;
    }
    match fs::read_to_string(p) {
        Ok(s) => match toml::from_str::<DashboardToml>(&s) {
            Ok(t) => t.overlay(default),
            Err(e) => {
                tracing::warn!(target = "dashboard_demo", error = %e, "Failed to parse TOML; using defaults");
                default
            }
        },
        Err(e) => {
            tracing::warn!(target = "dashboard_demo", error = %e, "Failed to read TOML; using defaults");
            default
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DashboardToml {
    pub base_url: Option<String>,
    pub sse_path: Option<String>,
    pub prompt_path: Option<String>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

impl DashboardToml {
    fn overlay(self, mut base: DashboardConfig) -> DashboardConfig {
        if let Some(url) = self.base_url {
            base.stream.base_url = url.clone();
            base.prompt.base_url = url;
        }
        if let Some(p) = self.sse_path {
            base.stream.sse_path = p;
        }
        if let Some(p) = self.prompt_path {
            base.prompt.prompt_path = p;
        }
        if let Some(v) = self.initial_backoff_ms {
            base.stream.initial_backoff_ms = v;
        }
        if let Some(v) = self.max_backoff_ms {
            base.stream.max_backoff_ms = v;
        }
        if let Some(v) = self.request_timeout_ms {
            base.prompt.request_timeout_ms = v;
        }
        base
    }
}
