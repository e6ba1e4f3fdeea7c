// Panel state machines
//
// Each panel task owns its reconciliation state, consumes its bus channels
// and publishes a derived view over a watch channel.

mod photo;
mod response;
mod timestamp;

pub use photo::{DisplayImage, ImageKind, PhotoConfig, PhotoPanel, PhotoState, PhotoToggle};
pub use response::{ResponseConfig, ResponsePanel, ResponseState, ResponseView};
pub use timestamp::{TimestampConfig, TimestampPanel, TimestampState};
