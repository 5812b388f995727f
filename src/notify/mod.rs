//! Outbound notifications.
//!
//! [`NotificationSink`] is the chat-channel seam. [`KillNotifier`] turns a
//! [`KillEvent`] into the two sink calls the poll loop and the command handler
//! need: the alert text, then the inventory image.
//!
//! Only sink failures fail a delivery. If the image cannot be rendered the
//! alert goes out without it and the kill still counts as delivered: a render
//! failure would recur on every retry, reposting the same text each cycle.

pub mod discord;
pub mod message;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::killboard::{killboard_link, KillEvent};
use crate::render::{GridComposer, InventorySlotMap};

pub use discord::DiscordSink;
pub use message::{format_kill_alert, split_message};

/// File name attached to inventory images.
pub const INVENTORY_FILENAME: &str = "inventory.png";

/// Failure to deliver a message. The triggering event stays unprocessed.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkError {
    Transport(String),
    Status(u16),
    Encoding(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Transport(msg) => write!(f, "sink transport error: {}", msg),
            SinkError::Status(code) => write!(f, "sink returned status {}", code),
            SinkError::Encoding(msg) => write!(f, "sink payload error: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

/// A chat channel that accepts text and image attachments.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError>;

    async fn send_image(
        &self,
        channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SinkError>;
}

/// Formats and delivers kill notifications.
pub struct KillNotifier {
    sink: Arc<dyn NotificationSink>,
    composer: Arc<GridComposer>,
    killboard_base_url: String,
    default_channel: String,
}

impl KillNotifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        composer: Arc<GridComposer>,
        killboard_base_url: String,
        default_channel: String,
    ) -> Self {
        Self {
            sink,
            composer,
            killboard_base_url,
            default_channel,
        }
    }

    /// The channel kill alerts go to.
    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    pub fn kill_link(&self, event: &KillEvent) -> String {
        killboard_link(&self.killboard_base_url, &event.event_id)
    }

    /// Sends plain text to `channel_id`.
    pub async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        self.sink.send_text(channel_id, text).await
    }

    /// Sends the alert text, then the inventory image if the victim carried anything.
    ///
    /// Returns `Ok` only if every sink call succeeded.
    pub async fn deliver_kill(&self, channel_id: &str, event: &KillEvent) -> Result<(), SinkError> {
        let text = format_kill_alert(event, &self.kill_link(event));
        self.sink.send_text(channel_id, &text).await?;
        self.send_inventory(channel_id, event).await?;
        Ok(())
    }

    /// Composes and sends the victim's inventory image.
    ///
    /// Returns `Ok(false)` when there was nothing to draw or the image could
    /// not be encoded; neither is a delivery failure.
    pub async fn send_inventory(&self, channel_id: &str, event: &KillEvent) -> Result<bool, SinkError> {
        let slots = InventorySlotMap::from_kill(event);
        if !slots.has_items() {
            debug!(event_id = %event.event_id, "No items to render");
            return Ok(false);
        }

        let png = match self.composer.compose(&slots).await {
            Ok(png) => png,
            Err(e) => {
                warn!(event_id = %event.event_id, error = %e, "Failed to render inventory image");
                return Ok(false);
            }
        };

        self.sink
            .send_image(channel_id, INVENTORY_FILENAME, png)
            .await?;
        Ok(true)
    }
}
