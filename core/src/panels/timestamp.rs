use crate::event::EventBus;
use chrono::{Local, TimeZone};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct TimestampConfig {
    pub channel: String,
    /// strftime layout for the derived label; time-of-day only by default
    pub format: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            channel: "timestamp".into(),
            format: "%H:%M:%S".into(),
        }
    }
}

/// Last successfully parsed capture time, formatted for display.
#[derive(Debug, Clone, Default)]
pub struct TimestampState {
    label: String,
}

impl TimestampState {
    /// Applies one epoch-seconds payload. Returns false on malformed or
    /// out-of-range input; the label is left unchanged.
    pub fn apply(&mut self, payload: &str, format: &str) -> bool {
        let Ok(secs) = payload.trim().parse::<i64>() else {
            return false;
        };
        let Some(at) = Local.timestamp_opt(secs, 0).earliest() else {
            return false;
        };
        self.label = at.format(format).to_string();
        true
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

pub struct TimestampPanel {
    bus: Arc<EventBus>,
    cfg: TimestampConfig,
}

impl TimestampPanel {
    pub fn new(bus: Arc<EventBus>, cfg: TimestampConfig) -> Self {
        Self { bus, cfg }
    }

    pub fn start(self) -> (watch::Receiver<String>, JoinHandle<()>) {
        let (view_tx, view_rx) = watch::channel(String::new());
        let handle = tokio::spawn(run_timestamp(self.bus, self.cfg, view_tx));
        (view_rx, handle)
    }
}

async fn run_timestamp(bus: Arc<EventBus>, cfg: TimestampConfig, view_tx: watch::Sender<String>) {
    let (_sub_id, mut rx) = bus.subscribe(&[cfg.channel.as_str()]);
    let mut state = TimestampState::default();

    while let Some(event) = rx.recv().await {
        if !state.apply(&event.data, &cfg.format) {
            debug!(target: "timestamp", payload = %event.data, "ignoring malformed timestamp payload");
            continue;
        }
        let label = state.label().to_string();
        view_tx.send_if_modified(|view| {
            if *view != label {
                *view = label;
                true
            } else {
                false
            }
        });
    }
}
