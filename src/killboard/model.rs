//! Kill records as returned by the gameinfo API.
//!
//! The remote payload is loosely typed: `EventId` is a number, most nested
//! objects can be `null`, and inventory arrays contain `null` holes. Records
//! are decoded one at a time so a single bad record does not poison the batch.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::FetchError;

/// Placeholder used when the remote omits a name or location.
pub const UNKNOWN: &str = "Unknown";

/// An item in an equipment slot or inventory cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Item type identifier, e.g. `T8_MAIN_SWORD@3`.
    pub item_type: String,
    /// Stack size, always at least 1.
    pub count: u32,
}

/// A single kill event for a tracked player.
#[derive(Debug, Clone, PartialEq)]
pub struct KillEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub killer_name: String,
    pub victim_name: String,
    pub location: String,
    /// Victim equipment in the order the remote listed the slots.
    pub victim_equipment: Vec<(String, Option<Item>)>,
    /// Victim inventory by position; `None` marks an empty cell.
    pub victim_inventory: Vec<Option<Item>>,
}

impl KillEvent {
    /// Timestamp truncated to whole seconds, e.g. `2024-01-01T00:00:00Z`.
    pub fn display_timestamp(&self) -> String {
        normalize_timestamp(&self.timestamp)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawKill {
    #[serde(default)]
    event_id: Option<Value>,
    #[serde(default, rename = "TimeStamp")]
    timestamp: Option<String>,
    #[serde(default)]
    killer: Option<RawParticipant>,
    #[serde(default)]
    victim: Option<RawParticipant>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawParticipant {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    equipment: Option<Map<String, Value>>,
    #[serde(default)]
    inventory: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "Type")]
    item_type: String,
    #[serde(rename = "Count", default)]
    count: Option<u32>,
}

/// Decodes a kills response body.
///
/// A body that is not a JSON array is malformed. Individual records missing
/// `EventId` or a parseable `TimeStamp` are dropped with a warning.
pub fn decode_kills(body: Value) -> Result<Vec<KillEvent>, FetchError> {
    let Value::Array(records) = body else {
        return Err(FetchError::Malformed(
            "expected a JSON array of kill records".to_string(),
        ));
    };

    let mut kills = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match decode_kill(record) {
            Ok(kill) => kills.push(kill),
            Err(reason) => warn!(index = index, reason = %reason, "Dropping malformed kill record"),
        }
    }
    Ok(kills)
}

fn decode_kill(record: Value) -> Result<KillEvent, String> {
    let raw: RawKill = serde_json::from_value(record).map_err(|e| e.to_string())?;

    let event_id = match raw.event_id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err("missing EventId".to_string()),
    };
    let raw_timestamp = raw.timestamp.ok_or("missing TimeStamp")?;
    let timestamp = parse_timestamp(&raw_timestamp)
        .ok_or_else(|| format!("unparseable TimeStamp '{}'", raw_timestamp))?;

    let killer_name = raw
        .killer
        .and_then(|k| k.name)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let (victim_name, victim_equipment, victim_inventory) = match raw.victim {
        Some(victim) => {
            let equipment = victim
                .equipment
                .unwrap_or_default()
                .into_iter()
                .map(|(slot, value)| (slot, decode_item(value)))
                .collect();
            let inventory = victim
                .inventory
                .unwrap_or_default()
                .into_iter()
                .map(decode_item)
                .collect();
            (
                victim.name.unwrap_or_else(|| UNKNOWN.to_string()),
                equipment,
                inventory,
            )
        }
        None => (UNKNOWN.to_string(), Vec::new(), Vec::new()),
    };

    Ok(KillEvent {
        event_id,
        timestamp,
        killer_name,
        victim_name,
        location: raw.location.unwrap_or_else(|| UNKNOWN.to_string()),
        victim_equipment,
        victim_inventory,
    })
}

fn decode_item(value: Value) -> Option<Item> {
    if value.is_null() {
        return None;
    }
    let raw: RawItem = serde_json::from_value(value).ok()?;
    if raw.item_type.is_empty() {
        return None;
    }
    Some(Item {
        item_type: raw.item_type,
        count: raw.count.unwrap_or(1).max(1),
    })
}

/// Parses an ISO-8601 timestamp. A missing offset is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp without fractional seconds.
pub fn normalize_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The most recent event, ties broken by event ID.
pub fn latest_kill(events: &[KillEvent]) -> Option<&KillEvent> {
    events.iter().max_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.event_id.cmp(&b.event_id))
    })
}

/// Builds the public killboard permalink for an event.
pub fn killboard_link(killboard_base_url: &str, event_id: &str) -> String {
    format!(
        "{}/killboard/kill/{}",
        killboard_base_url.trim_end_matches('/'),
        event_id
    )
}
