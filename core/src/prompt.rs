// Prompt catalog client and selector
//
// Independent of the event stream: one list fetch at startup, one update
// request per user selection. Outcomes surface as notifications.

use crate::config::base_url_from_env;
use crate::notify::{Notification, Notifier};
use crate::{Result, WatchtowerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct PromptConfig {
    pub base_url: String,
    pub prompt_path: String,
    pub request_timeout_ms: u64,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            base_url: base_url_from_env(),
            prompt_path: std::env::var("WATCHTOWER_PROMPT_PATH")
                .unwrap_or_else(|_| "/api/prompt".into()),
            request_timeout_ms: std::env::var("WATCHTOWER_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        }
    }
}

#[derive(Debug, Serialize)]
struct PromptUpdate<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the prompt endpoints
#[derive(Clone)]
pub struct PromptClient {
    http: reqwest::Client,
    cfg: PromptConfig,
}

impl PromptClient {
    pub fn new(cfg: PromptConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| WatchtowerError::PromptError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.prompt_path
        )
    }

    /// Fetches the prompt catalog.
    pub async fn list(&self) -> Result<Vec<String>> {
        let resp = self.http.get(self.endpoint()).send().await?;
        if !resp.status().is_success() {
            return Err(WatchtowerError::PromptError(format!(
                "prompt list returned status {}",
                resp.status()
            )));
        }
        Ok(resp.json::<Vec<String>>().await?)
    }

    /// Submits a prompt change. A failure carries the server-provided message.
    pub async fn update(&self, prompt: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint())
            .json(&PromptUpdate { prompt })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("prompt update returned status {status}"));
        Err(WatchtowerError::PromptError(message))
    }
}

/// Prompt dropdown state: the fetched catalog plus the active selection.
pub struct PromptSelector {
    client: PromptClient,
    notifier: Notifier,
    catalog: Vec<String>,
    selected: Option<String>,
}

impl PromptSelector {
    pub fn new(client: PromptClient, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            catalog: Vec::new(),
            selected: None,
        }
    }

    /// Fetches the catalog once. A failed fetch degrades to an empty list.
    pub async fn load(&mut self) {
        match self.client.list().await {
            Ok(catalog) => {
                debug!(target: "prompt", count = catalog.len(), "prompt catalog loaded");
                self.catalog = catalog;
            }
            Err(err) => {
                warn!(target: "prompt", error = %err, "failed to fetch prompt catalog");
                self.catalog.clear();
            }
        }
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Submits `prompt`; the outcome surfaces as exactly one notification.
    /// The selection only moves on success. No retry, no optimistic update.
    pub async fn select(&mut self, prompt: &str) {
        match self.client.update(prompt).await {
            Ok(()) => {
                self.selected = Some(prompt.to_string());
                self.notifier
                    .publish(Notification::success(format!("prompt changed to {prompt}")));
            }
            Err(WatchtowerError::PromptError(message)) => {
                self.notifier.publish(Notification::error(message));
            }
            Err(err) => {
                self.notifier.publish(Notification::error(err.to_string()));
            }
        }
    }
}
