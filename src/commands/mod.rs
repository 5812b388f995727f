//! Chat commands.
//!
//! `track <id> [id...]` starts tracking players. Each newly tracked player is
//! seeded with its current kill history as the baseline, so only kills that
//! happen afterwards are announced by the poll loop. The most recent existing
//! kill is echoed back as an acknowledgement.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::killboard::{latest_kill, KillSource};
use crate::notify::KillNotifier;
use crate::tracker::{BaselineSeed, EntityTracker};

#[cfg(test)]
mod tests;

pub const EMPTY_TRACK_REPLY: &str = "Please provide at least one player ID.";
pub const NOTHING_NEW_REPLY: &str = "No new player IDs added.";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Track(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(name) => write!(f, "unknown command '{}'", name),
        }
    }
}

impl std::error::Error for CommandError {}

/// Parses `track <id> [id...]`, with an optional `/` or `!` prefix.
pub fn parse_command(input: &str) -> Result<Command, CommandError> {
    let mut words = input.split_whitespace();
    let name = words.next().ok_or(CommandError::Empty)?;
    let name = name.trim_start_matches(['/', '!']);

    match name.to_ascii_lowercase().as_str() {
        "track" => Ok(Command::Track(words.map(str::to_string).collect())),
        _ => Err(CommandError::Unknown(name.to_string())),
    }
}

/// Player IDs are opaque tokens; anything that could alter the request path is rejected.
pub fn is_valid_player_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Result of a `track` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReply {
    pub message: String,
    pub newly_tracked: Vec<String>,
}

/// Executes chat commands against the shared tracker.
pub struct CommandHandler {
    tracker: Arc<EntityTracker>,
    source: Arc<dyn KillSource>,
    notifier: Arc<KillNotifier>,
}

impl CommandHandler {
    pub fn new(
        tracker: Arc<EntityTracker>,
        source: Arc<dyn KillSource>,
        notifier: Arc<KillNotifier>,
    ) -> Self {
        Self {
            tracker,
            source,
            notifier,
        }
    }

    /// Parses and executes `input`, then sends the reply text to `reply_channel`.
    pub async fn handle(&self, input: &str, reply_channel: &str) -> Result<TrackReply, CommandError> {
        let Command::Track(ids) = parse_command(input)?;
        let reply = self.track(&ids, reply_channel).await;
        if let Err(e) = self.notifier.send_text(reply_channel, &reply.message).await {
            warn!(channel_id = %reply_channel, error = %e, "Failed to send command reply");
        }
        Ok(reply)
    }

    /// Starts tracking `ids`, seeding each new player's baseline.
    ///
    /// Baseline inventory images are sent to `reply_channel` as they are
    /// found; the aggregated text is returned for the caller to deliver.
    pub async fn track(&self, ids: &[String], reply_channel: &str) -> TrackReply {
        self.track_players(ids, Some(reply_channel)).await
    }

    /// Like [`track`](Self::track), but posts nothing to any channel.
    ///
    /// Used for players registered at startup, where there is no conversation
    /// to reply into.
    pub async fn track_silently(&self, ids: &[String]) -> TrackReply {
        self.track_players(ids, None).await
    }

    async fn track_players(&self, ids: &[String], image_channel: Option<&str>) -> TrackReply {
        if ids.is_empty() {
            return TrackReply {
                message: EMPTY_TRACK_REPLY.to_string(),
                newly_tracked: Vec::new(),
            };
        }

        let mut newly_tracked = Vec::new();
        let mut entries = Vec::new();
        let mut rejected = Vec::new();

        for id in ids {
            if !is_valid_player_id(id) {
                rejected.push(format!("Invalid player ID: {}", id));
                continue;
            }
            if !self.tracker.add_pending_baseline(id) {
                continue;
            }
            info!(player_id = %id, "Now tracking player");
            newly_tracked.push(id.clone());
            entries.push(self.seed_player(id, image_channel).await);
        }

        let message = if newly_tracked.is_empty() {
            let mut lines = vec![NOTHING_NEW_REPLY.to_string()];
            lines.extend(rejected);
            lines.join("\n")
        } else {
            let mut message = String::from("Now tracking players:\n");
            for entry in entries.iter().chain(rejected.iter()) {
                message.push_str(entry);
                message.push_str("\n\n");
            }
            message.trim_end().to_string()
        };

        TrackReply {
            message,
            newly_tracked,
        }
    }

    /// Fetches a player's history and records it as the baseline.
    ///
    /// Returns the acknowledgement entry for this player. On fetch failure the
    /// player stays tracked with a pending baseline, which the poll loop seeds
    /// on its first successful fetch. If the poll loop seeded first, its
    /// baseline stands and no image is sent.
    async fn seed_player(&self, player_id: &str, image_channel: Option<&str>) -> String {
        let kills = match self.source.fetch_kills(player_id).await {
            Ok(kills) => kills,
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Failed to fetch baseline kills");
                return format!("Error fetching data for player {}: {}", player_id, e);
            }
        };

        let (latest, seeded) = match self.tracker.seed_baseline_if_pending(player_id, &kills) {
            BaselineSeed::Seeded(latest) => (latest, true),
            BaselineSeed::NotPending => {
                debug!(player_id = %player_id, "Baseline already seeded by poll loop");
                (latest_kill(&kills).cloned(), false)
            }
        };
        let Some(latest) = latest else {
            return format!("Player ID: {} has no recorded kills yet.", player_id);
        };

        if let (true, Some(channel)) = (seeded, image_channel) {
            if let Err(e) = self.notifier.send_inventory(channel, &latest).await {
                warn!(player_id = %player_id, error = %e, "Failed to send baseline inventory image");
            }
        }

        format!(
            "Player ID: {}\nLast Kill Time: {}\nKillboard Link: {}",
            player_id,
            latest.display_timestamp(),
            self.notifier.kill_link(&latest)
        )
    }
}
