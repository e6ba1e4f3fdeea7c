// Event bus implementation
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One named event received over the server push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Channel name (`annotated_image`, `timestamp`, ...)
    pub channel: String,
    /// Raw payload string; encoding is channel-specific
    pub data: String,
    /// Event id, when the server sent one
    pub id: Option<String>,
}

impl StreamEvent {
    pub fn new(channel: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Event handler trait for registration-style consumers
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: StreamEvent);
}

/// Subscription information
#[derive(Debug)]
struct Subscription {
    id: u64,
    // Empty filter means every channel
    channels: Vec<String>,
    sender: mpsc::Sender<StreamEvent>,
}

/// Per-channel delivery statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub dropped_events: u64,
}

/// In-process fan-out of named server events.
///
/// One stream client publishes; each consumer subscribes with a channel
/// filter and receives events over its own bounded queue. A single queue per
/// subscriber keeps arrival order across that subscriber's channels.
pub struct EventBus {
    // Subscription id -> subscription
    subscriptions: Arc<DashMap<u64, Subscription>>,

    // Channel name -> delivery stats
    stats: Arc<DashMap<String, ChannelStats>>,

    next_id: AtomicU64,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_queue_capacity(256)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity,
        }
    }

    /// Subscribe to a set of channels. An empty set receives everything.
    pub fn subscribe(&self, channels: &[&str]) -> (u64, mpsc::Receiver<StreamEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let subscription = Subscription {
            id,
            channels: channels.iter().map(|c| c.to_string()).collect(),
            sender: tx,
        };
        self.subscriptions.insert(id, subscription);

        info!(
            target: "bus",
            subscription = id,
            channels = ?channels,
            "created subscription"
        );
        (id, rx)
    }

    /// Publish an event to every matching subscription. Returns the number of
    /// subscribers the event was delivered to.
    pub async fn publish(&self, event: StreamEvent) -> u64 {
        debug!(target: "bus", channel = %event.channel, "publishing event");

        self.update_stats(&event.channel, |stats| stats.total_published += 1);

        // Collect matching senders first; awaiting a slow subscriber while
        // holding the map open would block subscribe/unsubscribe.
        let targets: Vec<(u64, mpsc::Sender<StreamEvent>)> = self
            .subscriptions
            .iter()
            .filter(|entry| {
                let sub = entry.value();
                sub.channels.is_empty() || sub.channels.iter().any(|c| c == &event.channel)
            })
            .map(|entry| (entry.value().id, entry.value().sender.clone()))
            .collect();

        let mut delivered = 0u64;
        let mut dropped = 0u64;
        for (id, sender) in targets {
            match sender.send(event.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    dropped += 1;
                    self.subscriptions.remove(&id);
                    warn!(target: "bus", subscription = id, "removing closed subscription");
                }
            }
        }

        self.update_stats(&event.channel, |stats| {
            stats.total_delivered += delivered;
            stats.dropped_events += dropped;
        });

        delivered
    }

    /// Register a handler for a set of channels. The spawned consumer loop
    /// runs the handler to completion before taking the next event.
    pub fn on_event(&self, channels: &[&str], handler: Arc<dyn EventHandler>) -> u64 {
        let (id, mut rx) = self.subscribe(channels);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler.handle(event).await;
            }
        });
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.subscriptions.remove(&id).is_some() {
            info!(target: "bus", subscription = id, "unsubscribed");
        }
    }

    /// Get delivery stats for a channel
    pub fn stats(&self, channel: &str) -> Option<ChannelStats> {
        self.stats.get(channel).map(|s| s.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn shutdown(&self) {
        info!(target: "bus", "event bus shutting down");
        self.subscriptions.clear();
    }

    // Update stats helper function
    fn update_stats<F>(&self, channel: &str, f: F)
    where
        F: FnOnce(&mut ChannelStats),
    {
        let mut entry = self
            .stats
            .entry(channel.to_string())
            .or_insert_with(ChannelStats::default);
        f(entry.value_mut());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
