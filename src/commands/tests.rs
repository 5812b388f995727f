use super::*;
use crate::killboard::FetchError;
use crate::render::{GridComposer, GridLayout};
use crate::testing::{kill, kill_with_item, FakeKillSource, RecordingSink, SentMessage, SolidIcons};

struct Harness {
    tracker: Arc<EntityTracker>,
    source: Arc<FakeKillSource>,
    sink: Arc<RecordingSink>,
    handler: CommandHandler,
}

fn harness() -> Harness {
    let tracker = Arc::new(EntityTracker::default());
    let source = Arc::new(FakeKillSource::default());
    let sink = Arc::new(RecordingSink::default());
    let composer = GridComposer::new(Arc::new(SolidIcons::default()), GridLayout::default());
    let notifier = Arc::new(KillNotifier::new(
        sink.clone(),
        Arc::new(composer),
        "https://albiononline.com".to_string(),
        "alerts".to_string(),
    ));
    let handler = CommandHandler::new(Arc::clone(&tracker), source.clone(), notifier);
    Harness {
        tracker,
        source,
        sink,
        handler,
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_track_command() {
    assert_eq!(
        parse_command("track abc def").unwrap(),
        Command::Track(ids(&["abc", "def"]))
    );
    assert_eq!(
        parse_command("  /TRACK   abc ").unwrap(),
        Command::Track(ids(&["abc"]))
    );
    assert_eq!(parse_command("!track").unwrap(), Command::Track(vec![]));
}

#[test]
fn test_parse_rejects_unknown_and_empty() {
    assert_eq!(parse_command("   "), Err(CommandError::Empty));
    assert_eq!(
        parse_command("/untrack abc"),
        Err(CommandError::Unknown("untrack".to_string()))
    );
}

#[test]
fn test_player_id_validation() {
    assert!(is_valid_player_id("Xz3-_9kQ"));
    assert!(!is_valid_player_id(""));
    assert!(!is_valid_player_id("../admin"));
    assert!(!is_valid_player_id("abc?x=1"));
    assert!(!is_valid_player_id(&"a".repeat(65)));
}

#[tokio::test]
async fn test_track_without_ids() {
    let h = harness();
    let reply = h.handler.track(&[], "cmd").await;
    assert_eq!(reply.message, "Please provide at least one player ID.");
    assert!(reply.newly_tracked.is_empty());
    assert!(h.tracker.is_empty());
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn test_handle_sends_empty_track_reply() {
    let h = harness();
    let reply = h.handler.handle("/track", "cmd").await.unwrap();
    assert_eq!(reply.message, EMPTY_TRACK_REPLY);
    assert_eq!(h.sink.texts(), vec![EMPTY_TRACK_REPLY.to_string()]);
    assert!(h.tracker.is_empty());
}

#[tokio::test]
async fn test_track_seeds_baseline_from_latest_kill() {
    let h = harness();
    h.source.set(
        "p1",
        Ok(vec![
            kill("E1", "2024-01-01T00:00:00.000Z"),
            kill_with_item("E2", "2024-01-02T08:30:00.250Z", "RED"),
        ]),
    );

    let reply = h.handler.track(&ids(&["p1"]), "cmd").await;
    assert_eq!(reply.newly_tracked, ids(&["p1"]));
    assert_eq!(
        reply.message,
        "Now tracking players:\n\
         Player ID: p1\n\
         Last Kill Time: 2024-01-02T08:30:00Z\n\
         Killboard Link: https://albiononline.com/killboard/kill/E2"
    );

    // Only the baseline image goes out, to the invoking channel.
    let sent = h.sink.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        SentMessage::Image { channel_id, .. } => assert_eq!(channel_id, "cmd"),
        other => panic!("expected image, got {:?}", other),
    }

    let entity = h.tracker.get("p1").unwrap();
    assert!(!entity.baseline_pending);
    assert_eq!(entity.last_event_id.as_deref(), Some("E2"));
    assert_eq!(entity.processed_count(), 2);
}

#[tokio::test]
async fn test_track_player_without_history() {
    let h = harness();
    let reply = h.handler.track(&ids(&["quiet"]), "cmd").await;
    assert_eq!(
        reply.message,
        "Now tracking players:\nPlayer ID: quiet has no recorded kills yet."
    );
    assert!(h.tracker.is_tracked("quiet"));
    assert!(!h.tracker.is_baseline_pending("quiet"));
}

#[tokio::test]
async fn test_track_fetch_error_keeps_baseline_pending() {
    let h = harness();
    h.source.set("p1", Err(FetchError::Status(404)));

    let reply = h.handler.track(&ids(&["p1"]), "cmd").await;
    assert!(reply
        .message
        .contains("Error fetching data for player p1: remote returned status 404"));
    assert!(h.tracker.is_tracked("p1"));
    assert!(h.tracker.is_baseline_pending("p1"));
}

#[tokio::test]
async fn test_track_twice_is_idempotent() {
    let h = harness();
    h.source
        .set("p1", Ok(vec![kill("E1", "2024-01-01T00:00:00Z")]));

    h.handler.track(&ids(&["p1"]), "cmd").await;
    h.tracker
        .mark_processed("p1", "E9", crate::testing::ts("2024-02-01T00:00:00Z"));
    let calls_after_first = h.source.calls();

    let reply = h.handler.track(&ids(&["p1"]), "cmd").await;
    assert_eq!(reply.message, NOTHING_NEW_REPLY);
    assert!(reply.newly_tracked.is_empty());
    assert_eq!(h.source.calls(), calls_after_first);

    let entity = h.tracker.get("p1").unwrap();
    assert_eq!(entity.processed_count(), 2);
    assert_eq!(entity.last_event_id.as_deref(), Some("E9"));
}

#[tokio::test]
async fn test_track_mixed_new_and_existing() {
    let h = harness();
    h.tracker.add("old");

    let reply = h
        .handler
        .track(&ids(&["old", "new", "new", "bad/id"]), "cmd")
        .await;
    assert_eq!(reply.newly_tracked, ids(&["new"]));
    assert!(reply.message.starts_with("Now tracking players:\n"));
    assert!(reply.message.contains("Player ID: new has no recorded kills yet."));
    assert!(reply.message.contains("Invalid player ID: bad/id"));
    assert!(!reply.message.contains("old"));
    assert_eq!(h.tracker.len(), 2);
}

#[tokio::test]
async fn test_tracked_player_history_not_notified_by_poll() {
    use crate::poller::KillPoller;
    use std::time::Duration;

    let h = harness();
    h.source.set(
        "p1",
        Ok(vec![
            kill("E1", "2024-01-01T00:00:00Z"),
            kill("E2", "2024-01-02T00:00:00Z"),
        ]),
    );
    h.handler.track(&ids(&["p1"]), "cmd").await;

    let composer = GridComposer::new(Arc::new(SolidIcons::default()), GridLayout::default());
    let notifier = Arc::new(KillNotifier::new(
        h.sink.clone(),
        Arc::new(composer),
        "https://albiononline.com".to_string(),
        "alerts".to_string(),
    ));
    let poller = KillPoller::new(
        Arc::clone(&h.tracker),
        h.source.clone(),
        notifier,
        Duration::from_secs(60),
        Duration::from_secs(30),
    );

    let report = poller.run_cycle().await;
    assert_eq!(report.notifications_sent, 0);
    assert!(h.sink.texts().is_empty());
}

#[tokio::test]
async fn test_track_silently_posts_nothing() {
    let h = harness();
    h.source.set(
        "p1",
        Ok(vec![kill_with_item("E1", "2024-01-01T00:00:00Z", "RED")]),
    );

    let reply = h.handler.track_silently(&ids(&["p1"])).await;
    assert_eq!(reply.newly_tracked, ids(&["p1"]));
    assert!(reply.message.contains("Last Kill Time: 2024-01-01T00:00:00Z"));
    assert!(h.sink.sent().is_empty());
    assert!(!h.tracker.is_baseline_pending("p1"));
}

/// Seeds the baseline from an older snapshot while the command's own fetch
/// is in flight, as a concurrent poll cycle would.
struct RacingSource {
    tracker: Arc<EntityTracker>,
    earlier: Vec<crate::killboard::KillEvent>,
    current: Vec<crate::killboard::KillEvent>,
}

#[async_trait::async_trait]
impl crate::killboard::KillSource for RacingSource {
    async fn fetch_kills(
        &self,
        player_id: &str,
    ) -> Result<Vec<crate::killboard::KillEvent>, FetchError> {
        self.tracker.seed_baseline_if_pending(player_id, &self.earlier);
        Ok(self.current.clone())
    }
}

#[tokio::test]
async fn test_track_keeps_poll_loop_baseline() {
    let tracker = Arc::new(EntityTracker::default());
    let sink = Arc::new(RecordingSink::default());
    let composer = GridComposer::new(Arc::new(SolidIcons::default()), GridLayout::default());
    let notifier = Arc::new(KillNotifier::new(
        sink.clone(),
        Arc::new(composer),
        "https://albiononline.com".to_string(),
        "alerts".to_string(),
    ));
    let source = Arc::new(RacingSource {
        tracker: Arc::clone(&tracker),
        earlier: vec![kill("E1", "2024-01-01T00:00:00Z")],
        current: vec![
            kill("E1", "2024-01-01T00:00:00Z"),
            kill_with_item("E2", "2024-01-02T00:00:00Z", "RED"),
        ],
    });
    let handler = CommandHandler::new(Arc::clone(&tracker), source.clone(), notifier);

    let reply = handler.track(&ids(&["p1"]), "cmd").await;
    assert!(reply.message.contains("Killboard Link: https://albiononline.com/killboard/kill/E2"));
    // The poll loop owns the baseline, so no baseline image goes out.
    assert!(sink.sent().is_empty());

    // E2 arrived after the poll loop's baseline and is still announced.
    let fresh = tracker.compute_new_events("p1", &source.current);
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].event_id, "E2");
}
