pub mod env;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::killboard::api::BASE_URL as GAMEINFO_BASE_URL;
use crate::notify::discord::BASE_URL as DISCORD_BASE_URL;
use crate::render::grid::{
    DEFAULT_BACKGROUND, DEFAULT_COLUMNS, DEFAULT_FONT_SIZE, DEFAULT_ICON_SIZE, DEFAULT_PADDING,
};
use crate::render::icons::BASE_URL as RENDER_BASE_URL;
use crate::tracker::DEFAULT_MAX_PROCESSED;

/// Complete killfeed configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KillfeedConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub killboard: KillboardConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Poll loop timing
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Upper bound on one cycle; players not reached in time wait for the next cycle
    #[serde(default = "default_cycle_deadline_seconds")]
    pub cycle_deadline_seconds: u64,
    /// Per-request HTTP timeout for every remote call
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_cycle_deadline_seconds() -> u64 {
    50
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            cycle_deadline_seconds: default_cycle_deadline_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_seconds.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

/// Remote gameinfo API and killboard permalinks
#[derive(Debug, Clone, Deserialize)]
pub struct KillboardConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_killboard_base_url")]
    pub killboard_base_url: String,
}

fn default_api_base_url() -> String {
    GAMEINFO_BASE_URL.to_string()
}

fn default_killboard_base_url() -> String {
    "https://albiononline.com".to_string()
}

impl Default for KillboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            killboard_base_url: default_killboard_base_url(),
        }
    }
}

/// Inventory image rendering
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,
    #[serde(default = "default_icon_size")]
    pub icon_size: u32,
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    /// Bold TTF/OTF used for stack counts; counts are omitted if unset or unreadable
    #[serde(default = "default_font_path")]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_icon_base_url() -> String {
    RENDER_BASE_URL.to_string()
}

fn default_icon_size() -> u32 {
    DEFAULT_ICON_SIZE
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

fn default_padding() -> u32 {
    DEFAULT_PADDING
}

fn default_background() -> [u8; 3] {
    DEFAULT_BACKGROUND
}

fn default_font_path() -> Option<PathBuf> {
    Some(PathBuf::from("ARIALBD.TTF"))
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            icon_base_url: default_icon_base_url(),
            icon_size: default_icon_size(),
            columns: default_columns(),
            padding: default_padding(),
            background: default_background(),
            font_path: default_font_path(),
            font_size: default_font_size(),
        }
    }
}

/// Dedup retention and startup tracking
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Processed event IDs kept per player; values below 64 are raised to 64
    #[serde(default = "default_max_processed")]
    pub max_processed_per_entity: usize,
    /// Players to track at startup, seeded like a `track` command
    #[serde(default)]
    pub initial_players: Vec<String>,
}

fn default_max_processed() -> usize {
    DEFAULT_MAX_PROCESSED
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_processed_per_entity: default_max_processed(),
            initial_players: Vec::new(),
        }
    }
}

/// Notification channel
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_discord_api_base_url")]
    pub api_base_url: String,
    /// Channel that receives kill alerts
    #[serde(default)]
    pub channel_id: String,
}

fn default_discord_api_base_url() -> String {
    DISCORD_BASE_URL.to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_discord_api_base_url(),
            channel_id: String::new(),
        }
    }
}

/// Command API listener
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3002
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<KillfeedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: KillfeedConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

impl KillfeedConfig {
    /// Loads `KILLFEED_CONFIG` (if set) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("KILLFEED_CONFIG") {
            Ok(path) => load_config(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }
}
