//! Fixed-period kill polling.
//!
//! Each cycle walks the tracked players one at a time: fetch their kills,
//! diff against the tracker, notify new kills oldest first, and mark each one
//! processed only after its notification went out. A player whose fetch or
//! send fails is skipped for this cycle and retried on the next one.
//!
//! Cycles never overlap. If a cycle overruns the interval, the missed ticks are
//! skipped rather than replayed back to back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::killboard::{FetchError, KillSource};
use crate::notify::KillNotifier;
use crate::tracker::{BaselineSeed, EntityTracker};


/// Outcome of one poll cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Players whose kills were fetched successfully
    pub players_polled: usize,
    /// Players whose fetch failed
    pub players_failed: usize,
    /// Player whose poll was cut off by the cycle deadline (0 or 1).
    ///
    /// Alerts it had already sent are marked processed in the tracker but are
    /// not counted in `notifications_sent`.
    pub players_interrupted: usize,
    /// Players not reached before the cycle deadline
    pub players_skipped: usize,
    /// Kills notified and marked processed
    pub notifications_sent: usize,
    /// Kills whose notification failed; retried next cycle
    pub notifications_failed: usize,
}

/// Status information for the poll loop.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PollerStatus {
    /// Completion time of the last cycle
    pub last_cycle: Option<DateTime<Utc>>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Total number of completed cycles
    pub cycle_count: u64,
    /// Total number of player fetch or notification failures
    pub error_count: u64,
    pub last_report: Option<CycleReport>,
}

/// Per-player result inside a cycle.
#[derive(Debug, Default)]
struct PlayerPoll {
    sent: usize,
    failed: usize,
    last_error: Option<String>,
}

/// Polls every tracked player on a fixed interval.
pub struct KillPoller {
    tracker: Arc<EntityTracker>,
    source: Arc<dyn KillSource>,
    notifier: Arc<KillNotifier>,
    interval: Duration,
    cycle_deadline: Duration,
    status: Arc<tokio::sync::Mutex<PollerStatus>>,
}

impl KillPoller {
    pub fn new(
        tracker: Arc<EntityTracker>,
        source: Arc<dyn KillSource>,
        notifier: Arc<KillNotifier>,
        interval: Duration,
        cycle_deadline: Duration,
    ) -> Self {
        Self {
            tracker,
            source,
            notifier,
            interval,
            cycle_deadline,
            status: Arc::new(tokio::sync::Mutex::new(PollerStatus::default())),
        }
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<tokio::sync::Mutex<PollerStatus>> {
        Arc::clone(&self.status)
    }

    /// Starts the polling loop (non-blocking).
    ///
    /// The first cycle runs immediately. Drop or [`PollerHandle::stop`] the
    /// returned handle to end the loop.
    pub fn start(self: Arc<Self>) -> PollerHandle {
        let handle = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                deadline_secs = self.cycle_deadline.as_secs(),
                "Starting kill poller"
            );

            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        });
        PollerHandle { handle: Some(handle) }
    }

    /// Runs one cycle over all tracked players and records its outcome.
    pub async fn run_cycle(&self) -> CycleReport {
        let player_ids = self.tracker.tracked_ids();
        debug!(players = player_ids.len(), "Checking for new kills");

        let deadline = Instant::now() + self.cycle_deadline;
        let mut report = CycleReport::default();
        let mut last_error = None;

        for (index, player_id) in player_ids.iter().enumerate() {
            let outcome = match timeout_at(deadline, self.poll_player(player_id)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let remaining = player_ids.len() - index - 1;
                    warn!(
                        player_id = %player_id,
                        remaining = remaining,
                        "Poll cycle deadline reached, deferring remaining players"
                    );
                    report.players_interrupted = 1;
                    report.players_skipped = remaining;
                    break;
                }
            };

            match outcome {
                Ok(poll) => {
                    report.players_polled += 1;
                    report.notifications_sent += poll.sent;
                    report.notifications_failed += poll.failed;
                    if poll.last_error.is_some() {
                        last_error = poll.last_error;
                    }
                }
                Err(e) => {
                    error!(player_id = %player_id, error = %e, "Failed to fetch kills");
                    report.players_failed += 1;
                    last_error = Some(format!("player {}: {}", player_id, e));
                }
            }
        }

        if report.notifications_sent > 0 || report.players_failed > 0 {
            info!(
                polled = report.players_polled,
                failed = report.players_failed,
                interrupted = report.players_interrupted,
                skipped = report.players_skipped,
                sent = report.notifications_sent,
                send_failures = report.notifications_failed,
                "Poll cycle complete"
            );
        }

        let mut status = self.status.lock().await;
        status.last_cycle = Some(Utc::now());
        status.cycle_count += 1;
        status.error_count += (report.players_failed + report.notifications_failed) as u64;
        status.last_error = last_error;
        status.last_report = Some(report.clone());

        report
    }

    /// Fetch → diff → notify for a single player.
    async fn poll_player(&self, player_id: &str) -> Result<PlayerPoll, FetchError> {
        let kills = self.source.fetch_kills(player_id).await?;

        if let BaselineSeed::Seeded(baseline) =
            self.tracker.seed_baseline_if_pending(player_id, &kills)
        {
            info!(
                player_id = %player_id,
                baseline = ?baseline.map(|k| k.event_id),
                "Seeded baseline without notifying history"
            );
            return Ok(PlayerPoll::default());
        }

        let new_kills = self.tracker.compute_new_events(player_id, &kills);
        if new_kills.is_empty() {
            debug!(player_id = %player_id, fetched = kills.len(), "No new kills");
            return Ok(PlayerPoll::default());
        }

        info!(player_id = %player_id, new_kills = new_kills.len(), "New kills found");

        let mut poll = PlayerPoll::default();
        let channel = self.notifier.default_channel();
        for kill in &new_kills {
            match self.notifier.deliver_kill(channel, kill).await {
                Ok(()) => {
                    self.tracker
                        .mark_processed(player_id, &kill.event_id, kill.timestamp);
                    poll.sent += 1;
                    info!(player_id = %player_id, event_id = %kill.event_id, "Kill alert sent");
                }
                Err(e) => {
                    warn!(
                        player_id = %player_id,
                        event_id = %kill.event_id,
                        error = %e,
                        "Failed to send kill alert, will retry next cycle"
                    );
                    poll.failed += 1;
                    poll.last_error = Some(format!("event {}: {}", kill.event_id, e));
                }
            }
        }
        Ok(poll)
    }
}

/// Owns the spawned poll loop task.
pub struct PollerHandle {
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stops the loop and waits for the task to wind down.
    ///
    /// A kill interrupted mid-notification was not marked processed and will
    /// be sent again by the next poller.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("Kill poller stopped");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
