use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::model::decode_kills;
use super::{FetchError, KillEvent, KillSource};

/// Default gameinfo API base URL (Europe/Amsterdam shard).
pub const BASE_URL: &str = "https://gameinfo-ams.albiononline.com/api/gameinfo";

/// HTTP client for the gameinfo kills endpoint.
pub struct GameInfoClient {
    http_client: Client,
    base_url: String,
}

impl GameInfoClient {
    /// Create a client against `base_url` with a per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("killfeed/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build gameinfo HTTP client")?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Create a client that shares an existing connection pool.
    pub fn with_client(http_client: Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn kills_url(&self, player_id: &str) -> String {
        format!("{}/players/{}/kills", self.base_url, player_id)
    }
}

#[async_trait]
impl KillSource for GameInfoClient {
    async fn fetch_kills(&self, player_id: &str) -> Result<Vec<KillEvent>, FetchError> {
        let url = self.kills_url(player_id);
        debug!(player_id = %player_id, url = %url, "Fetching kills");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport(e.to_string()))?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        decode_kills(value)
    }
}
