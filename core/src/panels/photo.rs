use crate::event::EventBus;
use crate::{Result, WatchtowerError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Which image feed the panel shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Annotated,
    Raw,
}

/// What the photo panel currently displays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DisplayImage {
    /// No payload has arrived yet for the selected kind
    #[default]
    Blank,
    Frame {
        kind: ImageKind,
        /// Base64 image bytes, as received
        base64: String,
    },
}

#[derive(Clone, Debug)]
pub struct PhotoConfig {
    pub annotated_channel: String,
    pub raw_channel: String,
    /// Kind selected at startup
    pub initial_kind: ImageKind,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            annotated_channel: "annotated_image".into(),
            raw_channel: "raw_image".into(),
            initial_kind: ImageKind::Annotated,
        }
    }
}

/// Reconciliation state for the photo panel.
///
/// Tracks the last-known payload per kind; the derived view is always the
/// most recent payload of the selected kind, or blank when none arrived yet.
#[derive(Debug, Clone)]
pub struct PhotoState {
    annotated: Option<String>,
    raw: Option<String>,
    selected: ImageKind,
}

impl PhotoState {
    pub fn new(selected: ImageKind) -> Self {
        Self {
            annotated: None,
            raw: None,
            selected,
        }
    }

    /// Records a payload for `kind`. Returns false when the payload is not
    /// valid base64; the event is dropped and prior state retained.
    pub fn record(&mut self, kind: ImageKind, payload: &str) -> bool {
        if BASE64.decode(payload.as_bytes()).is_err() {
            return false;
        }
        match kind {
            ImageKind::Annotated => self.annotated = Some(payload.to_string()),
            ImageKind::Raw => self.raw = Some(payload.to_string()),
        }
        true
    }

    pub fn select(&mut self, kind: ImageKind) {
        self.selected = kind;
    }

    pub fn selected(&self) -> ImageKind {
        self.selected
    }

    pub fn display(&self) -> DisplayImage {
        let payload = match self.selected {
            ImageKind::Annotated => self.annotated.as_ref(),
            ImageKind::Raw => self.raw.as_ref(),
        };
        match payload {
            Some(data) => DisplayImage::Frame {
                kind: self.selected,
                base64: data.clone(),
            },
            None => DisplayImage::Blank,
        }
    }
}

/// Handle for flipping the displayed image kind.
#[derive(Clone)]
pub struct PhotoToggle {
    sender: mpsc::Sender<ImageKind>,
}

impl PhotoToggle {
    pub async fn select(&self, kind: ImageKind) -> Result<()> {
        self.sender
            .send(kind)
            .await
            .map_err(|_| WatchtowerError::PanelError("photo panel stopped".into()))
    }
}

pub struct PhotoPanel {
    bus: Arc<EventBus>,
    cfg: PhotoConfig,
}

impl PhotoPanel {
    pub fn new(bus: Arc<EventBus>, cfg: PhotoConfig) -> Self {
        Self { bus, cfg }
    }

    pub fn start(self) -> (watch::Receiver<DisplayImage>, PhotoToggle, JoinHandle<()>) {
        let (view_tx, view_rx) = watch::channel(DisplayImage::Blank);
        let (toggle_tx, toggle_rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_photo(self.bus, self.cfg, view_tx, toggle_rx));
        (view_rx, PhotoToggle { sender: toggle_tx }, handle)
    }
}

async fn run_photo(
    bus: Arc<EventBus>,
    cfg: PhotoConfig,
    view_tx: watch::Sender<DisplayImage>,
    mut toggle_rx: mpsc::Receiver<ImageKind>,
) {
    let (_sub_id, mut rx) =
        bus.subscribe(&[cfg.annotated_channel.as_str(), cfg.raw_channel.as_str()]);
    let mut state = PhotoState::new(cfg.initial_kind);
    let mut toggle_open = true;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let kind = if event.channel == cfg.annotated_channel {
                    ImageKind::Annotated
                } else {
                    ImageKind::Raw
                };
                if !state.record(kind, &event.data) {
                    debug!(
                        target: "photo",
                        channel = %event.channel,
                        "dropping undecodable image payload"
                    );
                    continue;
                }
                publish_view(&view_tx, &state);
            }
            cmd = toggle_rx.recv(), if toggle_open => {
                match cmd {
                    Some(kind) => {
                        state.select(kind);
                        publish_view(&view_tx, &state);
                    }
                    // All toggle handles dropped; keep following the stream.
                    None => toggle_open = false,
                }
            }
        }
    }
}

fn publish_view(view_tx: &watch::Sender<DisplayImage>, state: &PhotoState) {
    let next = state.display();
    view_tx.send_if_modified(|view| {
        if *view != next {
            *view = next;
            true
        } else {
            false
        }
    });
}
