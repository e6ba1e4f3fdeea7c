use crate::event::EventBus;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ResponseConfig {
    /// Signals a new analysis cycle; clears the accumulator
    pub request_start_channel: String,
    /// Streamed text deltas
    pub chunk_channel: String,
    /// First token is out; the spinner goes away
    pub response_start_channel: String,
    /// Commit signal: publish the accumulator as the displayed answer
    pub commit_channel: String,
    /// JSON field carrying the text delta in chunk payloads
    pub delta_field: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            request_start_channel: "llm_request_start".into(),
            chunk_channel: "llm_response".into(),
            response_start_channel: "llm_response_start".into(),
            commit_channel: "prompt".into(),
            delta_field: "response".into(),
        }
    }
}

/// The rendered side of the response panel: spinner or committed text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseView {
    pub loading: bool,
    pub response: String,
}

/// Accumulator state machine for one streamed answer.
///
/// The accumulator clears exactly once per cycle (request start), grows once
/// per valid chunk, and is published into the committed string exactly at the
/// commit signal. A new request start always truncates an in-flight cycle;
/// overlapping cycles are not supported.
#[derive(Debug, Clone, Default)]
pub struct ResponseState {
    accumulator: String,
    loading: bool,
    committed: String,
}

impl ResponseState {
    pub fn begin_request(&mut self) {
        self.accumulator.clear();
        self.loading = true;
    }

    /// Appends the delta of one chunk payload. Returns false on payloads that
    /// do not parse or carry no delta field; nothing changes.
    pub fn apply_chunk(&mut self, payload: &str, delta_field: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
            return false;
        };
        let Some(delta) = value.get(delta_field).and_then(|v| v.as_str()) else {
            return false;
        };
        self.accumulator.push_str(delta);
        true
    }

    pub fn mark_response_started(&mut self) {
        self.loading = false;
    }

    /// Publishes the accumulator as the committed response. The loading flag
    /// stays wherever the start events last put it.
    pub fn commit(&mut self) {
        self.committed = self.accumulator.clone();
    }

    pub fn accumulator(&self) -> &str {
        &self.accumulator
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn view(&self) -> ResponseView {
        ResponseView {
            loading: self.loading,
            response: self.committed.clone(),
        }
    }
}

pub struct ResponsePanel {
    bus: Arc<EventBus>,
    cfg: ResponseConfig,
}

impl ResponsePanel {
    pub fn new(bus: Arc<EventBus>, cfg: ResponseConfig) -> Self {
        Self { bus, cfg }
    }

    pub fn start(self) -> (watch::Receiver<ResponseView>, JoinHandle<()>) {
        let (view_tx, view_rx) = watch::channel(ResponseView::default());
        let handle = tokio::spawn(run_response(self.bus, self.cfg, view_tx));
        (view_rx, handle)
    }
}

async fn run_response(bus: Arc<EventBus>, cfg: ResponseConfig, view_tx: watch::Sender<ResponseView>) {
    let (_sub_id, mut rx) = bus.subscribe(&[
        cfg.request_start_channel.as_str(),
        cfg.chunk_channel.as_str(),
        cfg.response_start_channel.as_str(),
        cfg.commit_channel.as_str(),
    ]);
    let mut state = ResponseState::default();

    while let Some(event) = rx.recv().await {
        if event.channel == cfg.request_start_channel {
            state.begin_request();
        } else if event.channel == cfg.chunk_channel {
            if !state.apply_chunk(&event.data, &cfg.delta_field) {
                debug!(target: "response", "ignoring malformed response chunk");
            }
        } else if event.channel == cfg.response_start_channel {
            state.mark_response_started();
        } else if event.channel == cfg.commit_channel {
            state.commit();
        }

        let next = state.view();
        view_tx.send_if_modified(|view| {
            if *view != next {
                *view = next;
                true
            } else {
                false
            }
        });
    }
}
