// Watchtower Core Library
// Client runtime for the live threat-detection dashboard

pub mod config;
pub mod event;
pub mod notify;
pub mod panels;
pub mod prompt;
pub mod shell;
pub mod stream;

// Export core types
pub use config::DashboardConfig;
pub use event::{ChannelStats, EventBus, EventHandler, StreamEvent};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use panels::{
    DisplayImage, ImageKind, PhotoPanel, PhotoToggle, ResponsePanel, ResponseView, TimestampPanel,
};
pub use prompt::{PromptClient, PromptSelector};
pub use shell::{Dashboard, DashboardHandles};
pub use stream::StreamClient;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchtowerError {
    #[error("Event bus error: {0}")]
    EventBusError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Panel error: {0}")]
    PanelError(String),

    #[error("Prompt API error: {0}")]
    PromptError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, WatchtowerError>;
