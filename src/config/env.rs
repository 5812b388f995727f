use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use super::KillfeedConfig;

impl KillfeedConfig {
    /// Applies `KILLFEED_*` overrides on top of file/default values.
    ///
    /// `lookup` resolves a variable name; values that fail to parse are
    /// ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parsed(&lookup, "KILLFEED_POLL_INTERVAL_SECONDS") {
            self.poll.interval_seconds = v;
        }
        if let Some(v) = parsed(&lookup, "KILLFEED_CYCLE_DEADLINE_SECONDS") {
            self.poll.cycle_deadline_seconds = v;
        }
        if let Some(v) = parsed(&lookup, "KILLFEED_REQUEST_TIMEOUT_SECONDS") {
            self.poll.request_timeout_seconds = v;
        }
        if let Some(v) = lookup("KILLFEED_API_BASE_URL") {
            self.killboard.api_base_url = v;
        }
        if let Some(v) = lookup("KILLFEED_KILLBOARD_BASE_URL") {
            self.killboard.killboard_base_url = v;
        }
        if let Some(v) = lookup("KILLFEED_ICON_BASE_URL") {
            self.render.icon_base_url = v;
        }
        if let Some(v) = lookup("KILLFEED_FONT_PATH") {
            self.render.font_path = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = parsed(&lookup, "KILLFEED_MAX_PROCESSED_PER_ENTITY") {
            self.tracker.max_processed_per_entity = v;
        }
        if let Some(v) = lookup("KILLFEED_INITIAL_PLAYERS") {
            self.tracker.initial_players = v
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("KILLFEED_CHANNEL_ID") {
            self.discord.channel_id = v;
        }
        if let Some(v) = lookup("KILLFEED_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = v;
        }
        if let Some(v) = lookup("KILLFEED_API_BIND_ADDRESS") {
            self.api.bind_address = v;
        }
        if let Some(v) = parsed(&lookup, "KILLFEED_API_PORT") {
            self.api.port = v;
        }
    }
}

fn parsed<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = %name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
