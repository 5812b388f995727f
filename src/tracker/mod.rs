//! Per-player dedup state.
//!
//! [`EntityTracker`] is the single store shared by the poll loop and the
//! command handler. All reads and writes go through one mutex, and the lock is
//! never held across an `.await`.
//!
//! Retention: each player keeps at most `max_processed_per_entity` processed
//! event IDs. When the cap is exceeded the oldest IDs (by event timestamp) are
//! evicted and the player's watermark moves up to the newest evicted
//! timestamp. Anything at or before the watermark counts as processed.
//!
//! The cap is floored at [`MIN_MAX_PROCESSED`], well above the number of kills
//! the remote feed returns per player. An event whose delivery failed is
//! therefore still inside the feed window, and below the cap, when it is
//! retried; newer successes cannot push the watermark past it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::killboard::KillEvent;


/// Default cap on remembered event IDs per player.
pub const DEFAULT_MAX_PROCESSED: usize = 512;

/// Smallest accepted cap; lower configured values are raised to this.
pub const MIN_MAX_PROCESSED: usize = 64;

/// Dedup state for one tracked player.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub id: String,
    /// Processed event ID → event timestamp.
    processed: HashMap<String, DateTime<Utc>>,
    pub last_event_time: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    /// Events at or before this instant are treated as processed.
    pub watermark: Option<DateTime<Utc>>,
    /// Set while a `track` command is still fetching the baseline.
    pub baseline_pending: bool,
}

impl TrackedEntity {
    fn new(id: &str, baseline_pending: bool) -> Self {
        Self {
            id: id.to_string(),
            processed: HashMap::new(),
            last_event_time: None,
            last_event_id: None,
            watermark: None,
            baseline_pending,
        }
    }

    /// Returns true if the event has already been handled for this player.
    pub fn is_processed(&self, event_id: &str, timestamp: &DateTime<Utc>) -> bool {
        self.processed.contains_key(event_id)
            || self.watermark.map_or(false, |w| *timestamp <= w)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    fn record(&mut self, event_id: &str, timestamp: DateTime<Utc>, cap: usize) {
        self.processed.insert(event_id.to_string(), timestamp);
        if self.last_event_time.map_or(true, |last| timestamp > last) {
            self.last_event_time = Some(timestamp);
            self.last_event_id = Some(event_id.to_string());
        }
        self.evict_over(cap);
    }

    fn evict_over(&mut self, cap: usize) {
        while self.processed.len() > cap {
            let oldest = self
                .processed
                .iter()
                .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
                .map(|(id, ts)| (id.clone(), *ts));
            let Some((id, ts)) = oldest else { break };
            self.processed.remove(&id);
            if self.watermark.map_or(true, |w| ts > w) {
                self.watermark = Some(ts);
            }
        }
    }
}

/// Read-only view of a tracked player for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackedSummary {
    pub player_id: String,
    pub processed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_kill_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_kill_time: Option<DateTime<Utc>>,
    pub baseline_pending: bool,
}

/// Outcome of [`EntityTracker::seed_baseline_if_pending`].
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineSeed {
    /// History recorded as processed; carries the most recent event, if any.
    Seeded(Option<KillEvent>),
    /// The player is untracked or its baseline was already seeded.
    NotPending,
}

/// Owns the tracked-player set and every player's dedup state.
pub struct EntityTracker {
    entities: Mutex<HashMap<String, TrackedEntity>>,
    max_processed: usize,
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROCESSED)
    }
}

impl EntityTracker {
    /// Creates an empty tracker. Caps below [`MIN_MAX_PROCESSED`] are raised to it.
    pub fn new(max_processed_per_entity: usize) -> Self {
        if max_processed_per_entity < MIN_MAX_PROCESSED {
            warn!(
                requested = max_processed_per_entity,
                minimum = MIN_MAX_PROCESSED,
                "Processed-event cap too small, using minimum"
            );
        }
        Self {
            entities: Mutex::new(HashMap::new()),
            max_processed: max_processed_per_entity.max(MIN_MAX_PROCESSED),
        }
    }

    /// Effective per-player cap on remembered event IDs.
    pub fn max_processed(&self) -> usize {
        self.max_processed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedEntity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `id` with an empty history. Returns false if already tracked.
    pub fn add(&self, id: &str) -> bool {
        self.insert(id, false)
    }

    /// Starts tracking `id`, holding back notifications until
    /// [`seed_baseline`](Self::seed_baseline) runs. Returns false if already tracked.
    pub fn add_pending_baseline(&self, id: &str) -> bool {
        self.insert(id, true)
    }

    fn insert(&self, id: &str, baseline_pending: bool) -> bool {
        let mut entities = self.lock();
        if entities.contains_key(id) {
            return false;
        }
        entities.insert(id.to_string(), TrackedEntity::new(id, baseline_pending));
        true
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn is_baseline_pending(&self, id: &str) -> bool {
        self.lock().get(id).map_or(false, |e| e.baseline_pending)
    }

    /// Tracked player IDs in stable (sorted) order.
    pub fn tracked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the events not yet processed for `id`, oldest first.
    ///
    /// Input order does not matter. Duplicate records for one event ID are
    /// collapsed. Untracked players and players awaiting a baseline yield
    /// nothing.
    pub fn compute_new_events(&self, id: &str, events: &[KillEvent]) -> Vec<KillEvent> {
        let entities = self.lock();
        let Some(entity) = entities.get(id) else {
            return Vec::new();
        };
        if entity.baseline_pending {
            return Vec::new();
        }

        let mut fresh: Vec<KillEvent> = events
            .iter()
            .filter(|e| !entity.is_processed(&e.event_id, &e.timestamp))
            .cloned()
            .collect();
        drop(entities);

        fresh.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        let mut seen = HashSet::new();
        fresh.retain(|e| seen.insert(e.event_id.clone()));
        fresh
    }

    /// Records a successfully notified event. No-op for untracked players.
    pub fn mark_processed(&self, id: &str, event_id: &str, timestamp: DateTime<Utc>) {
        let cap = self.max_processed;
        if let Some(entity) = self.lock().get_mut(id) {
            entity.record(event_id, timestamp, cap);
        }
    }

    /// Marks `events` as processed without notifying them, but only while the
    /// player's baseline is still pending.
    ///
    /// Checking and clearing the pending flag happen under one lock, so when
    /// the poll loop and a `track` command race, exactly one of them seeds.
    /// The loser gets [`BaselineSeed::NotPending`] and must not record its
    /// fetch; kills newer than the winner's baseline are left for the poll
    /// loop to announce.
    pub fn seed_baseline_if_pending(&self, id: &str, events: &[KillEvent]) -> BaselineSeed {
        let cap = self.max_processed;
        let mut entities = self.lock();
        let Some(entity) = entities.get_mut(id) else {
            return BaselineSeed::NotPending;
        };
        if !entity.baseline_pending {
            return BaselineSeed::NotPending;
        }

        let mut ordered: Vec<&KillEvent> = events.iter().collect();
        ordered.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        for event in &ordered {
            entity.record(&event.event_id, event.timestamp, cap);
        }
        entity.baseline_pending = false;

        BaselineSeed::Seeded(ordered.last().map(|e| (*e).clone()))
    }

    pub fn get(&self, id: &str) -> Option<TrackedEntity> {
        self.lock().get(id).cloned()
    }

    /// Summaries of every tracked player, sorted by ID.
    pub fn summaries(&self) -> Vec<TrackedSummary> {
        let mut summaries: Vec<TrackedSummary> = self
            .lock()
            .values()
            .map(|e| TrackedSummary {
                player_id: e.id.clone(),
                processed_count: e.processed_count(),
                last_kill_id: e.last_event_id.clone(),
                last_kill_time: e.last_event_time,
                baseline_pending: e.baseline_pending,
            })
            .collect();
        summaries.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        summaries
    }
}
