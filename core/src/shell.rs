// Dashboard composition root
//
// Owns the shared bus and notifier and wires the stream client, panels and
// prompt selector together. Holds no reconciliation state of its own.

use crate::config::DashboardConfig;
use crate::event::EventBus;
use crate::notify::Notifier;
use crate::panels::{
    DisplayImage, PhotoPanel, PhotoToggle, ResponsePanel, ResponseView, TimestampPanel,
};
use crate::prompt::{PromptClient, PromptSelector};
use crate::stream::StreamClient;
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Live handles to a running dashboard.
pub struct DashboardHandles {
    pub photo: watch::Receiver<DisplayImage>,
    pub photo_toggle: PhotoToggle,
    pub timestamp: watch::Receiver<String>,
    pub response: watch::Receiver<ResponseView>,
    pub selector: PromptSelector,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Dashboard runtime
pub struct Dashboard {
    event_bus: Arc<EventBus>,
    notifier: Notifier,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            event_bus: Arc::new(EventBus::new()),
            notifier: Notifier::default(),
            config,
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Starts the panels and the stream subscription, then fetches the prompt
    /// catalog once.
    pub async fn start(&self) -> Result<DashboardHandles> {
        info!(
            target: "dashboard",
            base_url = %self.config.stream.base_url,
            "starting dashboard"
        );

        let mut tasks = Vec::new();

        let (photo, photo_toggle, handle) =
            PhotoPanel::new(self.event_bus(), self.config.photo.clone()).start();
        tasks.push(handle);

        let (timestamp, handle) =
            TimestampPanel::new(self.event_bus(), self.config.timestamp.clone()).start();
        tasks.push(handle);

        let (response, handle) =
            ResponsePanel::new(self.event_bus(), self.config.response.clone()).start();
        tasks.push(handle);

        // The subscription opens after the panels so the first frames are
        // not lost.
        let stream = StreamClient::new(self.event_bus(), self.config.stream.clone());
        tasks.push(stream.start()?);

        let client = PromptClient::new(self.config.prompt.clone())?;
        let mut selector = PromptSelector::new(client, self.notifier.clone());
        selector.load().await;

        Ok(DashboardHandles {
            photo,
            photo_toggle,
            timestamp,
            response,
            selector,
            tasks,
        })
    }
}
