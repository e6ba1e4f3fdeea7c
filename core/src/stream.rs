// Server event stream client
//
// Maintains the single long-lived /api/sse subscription and fans incoming
// named events out through the EventBus. Reconnects with exponential backoff;
// the server can pin the next delay with a `retry:` field.

use crate::config::base_url_from_env;
use crate::event::{EventBus, StreamEvent};
use crate::{Result, WatchtowerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Event stream configuration
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Server base URL
    pub base_url: String,
    /// Path of the event stream endpoint
    pub sse_path: String,
    /// First reconnect delay; doubles up to `max_backoff_ms`
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Connect-phase timeout for each subscription attempt
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: base_url_from_env(),
            sse_path: std::env::var("WATCHTOWER_SSE_PATH").unwrap_or_else(|_| "/api/sse".into()),
            initial_backoff_ms: std::env::var("WATCHTOWER_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000),
            max_backoff_ms: std::env::var("WATCHTOWER_MAX_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            connect_timeout_ms: 10_000,
        }
    }
}

/// The process-wide event stream subscription.
///
/// Created once at startup; consumers register on the bus rather than opening
/// their own connections.
pub struct StreamClient {
    bus: Arc<EventBus>,
    cfg: StreamConfig,
}

impl StreamClient {
    pub fn new(bus: Arc<EventBus>, cfg: StreamConfig) -> Self {
        Self { bus, cfg }
    }

    pub fn start(self) -> Result<JoinHandle<()>> {
        // Only the connect phase is bounded; a total-request timeout would
        // kill the long-lived stream.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(self.cfg.connect_timeout_ms))
            .build()
            .map_err(|e| WatchtowerError::StreamError(format!("failed to build HTTP client: {e}")))?;

        let handle = tokio::spawn(run_stream(http, self.bus, self.cfg));
        Ok(handle)
    }
}

async fn run_stream(http: reqwest::Client, bus: Arc<EventBus>, cfg: StreamConfig) {
    let url = format!("{}{}", cfg.base_url.trim_end_matches('/'), cfg.sse_path);
    let mut backoff_ms = cfg.initial_backoff_ms;
    let mut retry_override: Option<u64> = None;
    let mut last_event_id: Option<String> = None;

    loop {
        let mut req = http
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(id) = &last_event_id {
            req = req.header("Last-Event-ID", id.clone());
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(target: "stream", url = %url, "event stream connected");
                let delivered =
                    consume_stream(resp, &bus, &mut last_event_id, &mut retry_override).await;
                if delivered > 0 {
                    backoff_ms = cfg.initial_backoff_ms;
                }
                debug!(target: "stream", url = %url, "event stream ended");
            }
            Ok(resp) => {
                warn!(
                    target: "stream",
                    url = %url,
                    status = %resp.status(),
                    "event stream subscription rejected"
                );
            }
            Err(err) => {
                debug!(target: "stream", url = %url, error = %err, "event stream connect failed");
            }
        }

        // Disconnects never surface to the user; the panels simply stop
        // updating until the subscription comes back.
        let delay = retry_override.take().unwrap_or(backoff_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        backoff_ms = (backoff_ms * 2).min(cfg.max_backoff_ms);
    }
}

/// Reads one connection's body to the end. Returns the number of events
/// dispatched into the bus.
async fn consume_stream(
    resp: reqwest::Response,
    bus: &EventBus,
    last_event_id: &mut Option<String>,
    retry_override: &mut Option<u64>,
) -> u64 {
    let mut delivered = 0u64;
    let mut parser = SseParser::new();
    let mut body = resp.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for frame in parser.push(&bytes) {
                    if let Some(ms) = frame.retry {
                        *retry_override = Some(ms);
                    }
                    if let Some(id) = &frame.id {
                        *last_event_id = Some(id.clone());
                    }
                    if let Some(event) = frame.into_event() {
                        bus.publish(event).await;
                        delivered += 1;
                    }
                }
            }
            Err(err) => {
                debug!(target: "stream", error = %err, "error while reading event stream");
                break;
            }
        }
    }

    // An unterminated frame at end of stream is discarded per the wire format.
    delivered
}

/// One block of fields terminated by a blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SseFrame {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseFrame {
    /// Frames without data lines are not dispatched.
    fn into_event(self) -> Option<StreamEvent> {
        if self.data.is_empty() {
            return None;
        }
        let channel = self.event.unwrap_or_else(|| "message".to_string());
        let mut event = StreamEvent::new(channel, self.data.join("\n"));
        if let Some(id) = self.id {
            event = event.with_id(id);
        }
        Some(event)
    }
}

/// Incremental parser for the SSE wire format.
///
/// Feed raw body chunks in; completed frames come out as their terminating
/// blank line arrives. Byte-buffered so a chunk boundary may fall anywhere,
/// including inside a UTF-8 sequence.
struct SseParser {
    buffer: Vec<u8>,
    current: SseFrame,
}

impl SseParser {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            current: SseFrame::default(),
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(frame) = self.push_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Returns the completed frame when `line` is the blank terminator.
    fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            let frame = std::mem::take(&mut self.current);
            if frame == SseFrame::default() {
                return None;
            }
            return Some(frame);
        }
        if line.starts_with(':') {
            // Comment / keep-alive line
            return None;
        }

        let (field, value) = match line.split_once(':') {
            // A single leading space in the value is stripped, further
            // whitespace is payload.
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event = Some(value.to_string()),
            "data" => self.current.data.push(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.current.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }
}
