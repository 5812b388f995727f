//! Remote kill-event source.
//!
//! [`KillSource`] is the seam the poll loop and the command handler fetch
//! through; [`GameInfoClient`] is the HTTP implementation against the Albion
//! gameinfo API.

pub mod api;
pub mod model;

use async_trait::async_trait;
use std::fmt;

pub use api::GameInfoClient;
pub use model::{killboard_link, latest_kill, normalize_timestamp, Item, KillEvent};

/// Recoverable failure while fetching kills for one player.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connection, timeout or body read failure.
    Transport(String),
    /// Remote answered with a non-success status.
    Status(u16),
    /// Body was not the expected shape.
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchError::Status(code) => write!(f, "remote returned status {}", code),
            FetchError::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of kill events per tracked player.
#[async_trait]
pub trait KillSource: Send + Sync {
    /// Returns the kills currently reported for `player_id`, in remote order.
    async fn fetch_kills(&self, player_id: &str) -> Result<Vec<KillEvent>, FetchError>;
}
