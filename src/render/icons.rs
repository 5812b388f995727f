use async_trait::async_trait;
use dashmap::DashMap;
use image::DynamicImage;
use reqwest::Client;
use std::fmt;
use tracing::debug;

/// Default item render service base URL.
pub const BASE_URL: &str = "https://render.albiononline.com/v1";

/// Failure to obtain a single icon. The slot is skipped, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum IconError {
    Transport(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for IconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IconError::Transport(msg) => write!(f, "icon transport error: {}", msg),
            IconError::Status(code) => write!(f, "icon service returned status {}", code),
            IconError::Decode(msg) => write!(f, "icon decode error: {}", msg),
        }
    }
}

impl std::error::Error for IconError {}

/// Resolves an item type to a decoded icon.
#[async_trait]
pub trait IconSource: Send + Sync {
    async fn fetch_icon(&self, item_type: &str, size: u32) -> Result<DynamicImage, IconError>;
}

/// Icon source backed by the item render service.
///
/// Icons are immutable per `(type, size)`, so decoded images are cached for
/// the process lifetime. Failures are not cached.
pub struct RenderServiceIcons {
    http_client: Client,
    base_url: String,
    cache: DashMap<(String, u32), DynamicImage>,
}

impl RenderServiceIcons {
    pub fn new(http_client: Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: DashMap::new(),
        }
    }

    fn icon_url(&self, item_type: &str, size: u32) -> String {
        format!("{}/item/{}.png?size={}", self.base_url, item_type, size)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl IconSource for RenderServiceIcons {
    async fn fetch_icon(&self, item_type: &str, size: u32) -> Result<DynamicImage, IconError> {
        let key = (item_type.to_string(), size);
        if let Some(icon) = self.cache.get(&key) {
            return Ok(icon.clone());
        }

        let url = self.icon_url(item_type, size);
        debug!(item_type = %item_type, url = %url, "Fetching item icon");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| IconError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IconError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IconError::Transport(e.to_string()))?;
        let icon = image::load_from_memory(&bytes).map_err(|e| IconError::Decode(e.to_string()))?;

        self.cache.insert(key, icon.clone());
        Ok(icon)
    }
}
