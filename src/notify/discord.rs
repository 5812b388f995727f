use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use super::message::{split_message, MAX_MESSAGE_LEN};
use super::{NotificationSink, SinkError};

/// Default Discord REST API base URL.
pub const BASE_URL: &str = "https://discord.com/api/v10";

/// Posts messages to Discord channels through the bot REST API.
pub struct DiscordSink {
    http_client: Client,
    base_url: String,
    bot_token: String,
}

impl DiscordSink {
    pub fn new(http_client: Client, base_url: String, bot_token: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.base_url, channel_id)
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token)
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        let url = self.messages_url(channel_id);
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let response = self
                .http_client
                .post(&url)
                .header("Authorization", self.authorization())
                .json(&json!({ "content": chunk }))
                .send()
                .await
                .map_err(|e| SinkError::Transport(e.to_string()))?;
            check_response_status(response)?;
        }
        debug!(channel_id = %channel_id, "Sent text message");
        Ok(())
    }

    async fn send_image(
        &self,
        channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SinkError> {
        let payload = json!({ "attachments": [{ "id": 0, "filename": filename }] });
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .map_err(|e| SinkError::Encoding(e.to_string()))?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", part);

        let response = self
            .http_client
            .post(self.messages_url(channel_id))
            .header("Authorization", self.authorization())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        check_response_status(response)?;

        debug!(channel_id = %channel_id, filename = %filename, "Sent image attachment");
        Ok(())
    }
}

/// Maps non-2xx responses to [`SinkError::Status`], logging rate limits.
fn check_response_status(response: Response) -> Result<(), SinkError> {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            warn!(retry_after = %retry_after, "Discord rate limit hit");
            Err(SinkError::Status(429))
        }
        s if !s.is_success() => Err(SinkError::Status(s.as_u16())),
        _ => Ok(()),
    }
}
