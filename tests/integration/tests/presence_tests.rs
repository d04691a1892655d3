//! Presence and typing scenarios over the in-memory stores
//!
//! Run with: cargo test -p integration-tests --test presence_tests

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{
    next_within, stays_silent, unique_conversation, unique_user, wait_for, DelayedEphemeralStore,
    FaultyEphemeralStore, FaultyProfileStore, Latency, MemoryHarness, STREAM_TIMEOUT,
};
use parking_lot::Mutex;
use presence_core::{
    ConversationId, Document, PresenceRecord, PresenceState, StorePath, USERS_COLLECTION,
};
use presence_service::{
    AppState, CounterpartStatus, Effect, EffectOutcome, SessionEvent, SessionLifecycleObserver,
    TypingIndicator,
};
use serde_json::json;
use tokio::sync::mpsc;

const SILENCE: Duration = Duration::from_millis(100);

fn status_of(harness: &MemoryHarness, user: &presence_core::UserId) -> PresenceState {
    PresenceRecord::state_of(harness.backend.value(&StorePath::status(user)).as_ref())
}

// ============================================================================
// Online / offline
// ============================================================================

#[tokio::test]
async fn test_mark_online_seen_by_second_observer() {
    let harness = MemoryHarness::new();
    let writer = harness.client();
    let observer = harness.client();
    let u1 = unique_user("u1");

    writer.sync.mark_online(&u1).await;

    let mut online = observer.sync.observe_online(&u1).await;
    assert!(wait_for(&mut online, STREAM_TIMEOUT, |v| *v).await.unwrap());
}

#[tokio::test]
async fn test_subscribed_observer_sees_online_within_completion() {
    let harness = MemoryHarness::new();
    let a = harness.client();
    let b = harness.client();
    let u1 = unique_user("u1");

    let mut online = b.sync.observe_online(&u1).await;
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    a.sync.mark_online(&u1).await;
    // Delivered by the time the write completed; no waiting needed.
    assert!(next_within(&mut online, Duration::from_millis(10)).await.unwrap());
}

#[tokio::test]
async fn test_mark_offline_updates_observer_and_profile() {
    let harness = MemoryHarness::new();
    let writer = harness.client();
    let observer = harness.client();
    let u1 = unique_user("u1");

    writer.sync.mark_online(&u1).await;
    let mut online = observer.sync.observe_online(&u1).await;
    assert!(next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    writer.sync.mark_offline(&u1).await;
    assert!(!wait_for(&mut online, STREAM_TIMEOUT, |v| !*v).await.unwrap());

    let mirror = observer.sync.profile_presence(&u1).await.unwrap();
    assert!(!mirror.online);
    assert!(mirror.last_seen.is_some());
}

#[tokio::test]
async fn test_mark_online_twice_keeps_one_record_with_latest_timestamp() {
    let harness = MemoryHarness::new();
    let client = harness.client();
    let u1 = unique_user("u1");

    client.sync.mark_online(&u1).await;
    let second = harness.clock.advance(250);
    client.sync.mark_online(&u1).await;

    let stored = harness.backend.value(&StorePath::status(&u1)).unwrap();
    assert_eq!(stored, json!({"state": "online", "lastChanged": second}));

    // The fallback was replaced, not duplicated: one offline write on disconnect.
    let observer = harness.client();
    let mut online = observer.sync.observe_online(&u1).await;
    assert!(next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    client.connection.disconnect();
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());
    assert!(stays_silent(&mut online, SILENCE).await);
}

#[tokio::test]
async fn test_profile_merge_preserves_unrelated_fields() {
    let harness = MemoryHarness::new();
    let client = harness.client();
    let u1 = unique_user("u1");

    let mut document = Document::new();
    document.insert("displayName".into(), json!("Ann"));
    document.insert("photoUrl".into(), json!("https://example.com/a.png"));
    harness.profiles.insert(USERS_COLLECTION, u1.as_str(), document);

    client.sync.mark_online(&u1).await;
    client.sync.mark_offline(&u1).await;

    let document = presence_core::ProfileStore::get_document(&harness.profiles, USERS_COLLECTION, u1.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document["displayName"], json!("Ann"));
    assert_eq!(document["photoUrl"], json!("https://example.com/a.png"));
    assert_eq!(document["online"], json!(false));
    assert!(document["lastSeen"].is_string());
}

// ============================================================================
// Disconnect fallback
// ============================================================================

#[tokio::test]
async fn test_abrupt_disconnect_writes_offline() {
    let harness = MemoryHarness::new();
    let client = harness.client();
    let u2 = unique_user("u2");

    client.sync.mark_online(&u2).await;
    assert_eq!(status_of(&harness, &u2), PresenceState::Online);

    let dropped_at = harness.clock.advance(5_000);
    // Network drop: the session goes away without calling mark_offline.
    drop(client);

    let record = PresenceRecord::from_value(&harness.backend.value(&StorePath::status(&u2)).unwrap())
        .unwrap();
    assert_eq!(record.state, PresenceState::Offline);
    assert_eq!(record.last_changed, dropped_at);
}

#[tokio::test]
async fn test_unregistered_fallback_degrades_to_explicit_offline_only() {
    let harness = MemoryHarness::new();
    let connection = Arc::new(harness.backend.connect());
    let faulty = Arc::new(FaultyEphemeralStore::new(connection.clone()).failing_hooks());
    let sync = harness.synchronizer(faulty, Arc::new(harness.profiles.clone()));
    let u1 = unique_user("u1");

    let report = sync.mark_online(&u1).await;
    assert!(matches!(
        report.outcome(Effect::DisconnectFallback),
        Some(EffectOutcome::Failed { code: "UNSUPPORTED", .. })
    ));
    assert_eq!(report.outcome(Effect::PresenceWrite), Some(&EffectOutcome::Applied));
    assert_eq!(report.outcome(Effect::ProfileMirror), Some(&EffectOutcome::Applied));

    connection.disconnect();
    assert_eq!(status_of(&harness, &u1), PresenceState::Online);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_profile_failure_does_not_block_presence_write() {
    let harness = MemoryHarness::new();
    let connection = Arc::new(harness.backend.connect());
    let profiles = Arc::new(FaultyProfileStore::new(Arc::new(harness.profiles.clone())));
    profiles.fail_merge.store(true, std::sync::atomic::Ordering::SeqCst);
    let sync = harness.synchronizer(connection, profiles.clone());
    let u1 = unique_user("u1");

    let report = sync.mark_online(&u1).await;
    assert!(!report.is_complete());
    assert_eq!(
        report.failures().map(|(effect, _)| effect).collect::<Vec<_>>(),
        vec![Effect::ProfileMirror]
    );
    assert_eq!(status_of(&harness, &u1), PresenceState::Online);

    profiles.fail_read.store(true, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(sync.profile_presence(&u1).await, None);
}

#[tokio::test]
async fn test_write_failure_still_mirrors_profile() {
    let harness = MemoryHarness::new();
    let faulty = Arc::new(FaultyEphemeralStore::new(Arc::new(harness.backend.connect())).failing_writes());
    let sync = harness.synchronizer(faulty, Arc::new(harness.profiles.clone()));
    let u1 = unique_user("u1");

    let report = sync.mark_online(&u1).await;
    assert!(matches!(
        report.outcome(Effect::PresenceWrite),
        Some(EffectOutcome::Failed { code: "WRITE_REJECTED", .. })
    ));
    assert!(sync.profile_presence(&u1).await.unwrap().online);
    assert_eq!(sync.local_state(&u1), PresenceState::Online);

    let outcome = sync.set_typing(&unique_conversation(), &u1, true).await;
    assert!(!outcome.is_applied());
}

#[tokio::test]
async fn test_failed_subscription_stays_silent() {
    let harness = MemoryHarness::new();
    let faulty = Arc::new(FaultyEphemeralStore::new(Arc::new(harness.backend.connect())).failing_subscribe());
    let sync = harness.synchronizer(faulty, Arc::new(harness.profiles.clone()));
    let writer = harness.client();
    let u1 = unique_user("u1");

    let mut online = sync.observe_online(&u1).await;
    writer.sync.mark_online(&u1).await;
    assert!(stays_silent(&mut online, SILENCE).await);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_rapid_toggle_awaited_ends_offline() {
    let harness = MemoryHarness::new();
    let client = harness.client();
    let u3 = unique_user("u3");

    client.sync.mark_online(&u3).await;
    client.sync.mark_offline(&u3).await;

    assert_eq!(status_of(&harness, &u3), PresenceState::Offline);
    assert_eq!(client.sync.local_state(&u3), PresenceState::Offline);
}

#[tokio::test]
async fn test_rapid_toggle_with_out_of_order_acks_ends_offline() {
    let harness = MemoryHarness::new();
    let delayed = Arc::new(DelayedEphemeralStore::new(
        Arc::new(harness.backend.connect()),
        Latency::AfterApply,
        [Duration::from_millis(50), Duration::ZERO],
    ));
    let sync = harness.synchronizer(delayed, Arc::new(harness.profiles.clone()));
    let u3 = unique_user("u3");

    let completed = Mutex::new(Vec::new());
    tokio::join!(
        async {
            sync.mark_online(&u3).await;
            completed.lock().push(PresenceState::Online);
        },
        async {
            sync.mark_offline(&u3).await;
            completed.lock().push(PresenceState::Offline);
        },
    );

    // Acknowledged in reverse call order, applied in call order.
    assert_eq!(
        *completed.lock(),
        vec![PresenceState::Offline, PresenceState::Online]
    );
    assert_eq!(status_of(&harness, &u3), PresenceState::Offline);
    assert_eq!(sync.local_state(&u3), PresenceState::Offline);
}

#[tokio::test]
async fn test_rapid_toggle_with_reordered_writes_converges() {
    let harness = MemoryHarness::new();
    let delayed = Arc::new(DelayedEphemeralStore::new(
        Arc::new(harness.backend.connect()),
        Latency::BeforeApply,
        [Duration::from_millis(30), Duration::ZERO],
    ));
    let sync = harness.synchronizer(delayed, Arc::new(harness.profiles.clone()));
    let observer = harness.client();
    let u3 = unique_user("u3");

    let mut online = observer.sync.observe_online(&u3).await;
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    tokio::join!(sync.mark_online(&u3), sync.mark_offline(&u3));

    // Without sequencing either write may land last; observers still agree
    // with the store once it settles.
    let stored = status_of(&harness, &u3).is_online();
    let mut last_seen = false;
    while let Ok(value) = next_within(&mut online, SILENCE).await {
        last_seen = value;
    }
    assert_eq!(last_seen, stored);
    assert_eq!(sync.local_state(&u3), PresenceState::Offline);
}

// ============================================================================
// Typing
// ============================================================================

#[tokio::test]
async fn test_typing_true_then_false_removes_node() {
    let harness = MemoryHarness::new();
    let typist = harness.client();
    let watcher = harness.client();
    let c = unique_conversation();
    let u1 = unique_user("u1");

    let mut typing = watcher.sync.observe_typing(&c, &u1).await;
    assert!(!next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());

    typist.sync.set_typing(&c, &u1, true).await;
    typist.sync.set_typing(&c, &u1, false).await;

    assert!(next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());
    assert!(!next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());
    assert_eq!(harness.backend.value(&StorePath::typing(&c, &u1)), None);
}

#[tokio::test]
async fn test_typing_flag_cleared_by_abrupt_disconnect() {
    let harness = MemoryHarness::new();
    let typist = harness.client();
    let c = unique_conversation();
    let u1 = unique_user("u1");

    typist.sync.set_typing(&c, &u1, true).await;
    assert_eq!(harness.backend.value(&StorePath::typing(&c, &u1)), Some(json!(true)));

    drop(typist);
    assert_eq!(harness.backend.value(&StorePath::typing(&c, &u1)), None);
}

#[tokio::test]
async fn test_conversation_screen_between_two_users() {
    let harness = MemoryHarness::new();
    let alice = harness.client();
    let bob = harness.client();
    let alice_id = unique_user("alice");
    let bob_id = unique_user("bob");
    let conversation = ConversationId::direct(&alice_id, &bob_id).unwrap();
    assert_eq!(conversation, ConversationId::direct(&bob_id, &alice_id).unwrap());

    alice.sync.mark_online(&alice_id).await;
    let mut status = alice.sync.observe_counterpart(&conversation, &bob_id).await;
    assert_eq!(
        next_within(&mut status, STREAM_TIMEOUT).await.unwrap(),
        CounterpartStatus::default()
    );

    bob.sync.mark_online(&bob_id).await;
    let mut input = TypingIndicator::new(bob.sync.clone(), conversation.clone(), bob_id.clone());
    input.input_changed("h").await;
    input.input_changed("hi").await;

    let seen = wait_for(&mut status, STREAM_TIMEOUT, |s| s.typing).await.unwrap();
    assert_eq!(
        seen,
        CounterpartStatus {
            online: true,
            typing: true
        }
    );

    input.message_sent().await;
    let seen = wait_for(&mut status, STREAM_TIMEOUT, |s| !s.typing).await.unwrap();
    assert!(seen.online);

    input.close().await;
    bob.sync.mark_offline(&bob_id).await;
    let seen = wait_for(&mut status, STREAM_TIMEOUT, |s| !s.online).await.unwrap();
    assert!(!seen.typing);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_lifecycle_events_drive_presence() {
    let harness = MemoryHarness::new();
    let device = harness.client();
    let watcher = harness.client();
    let u1 = unique_user("u1");

    let mut online = watcher.sync.observe_online(&u1).await;
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    let (tx, rx) = mpsc::channel(8);
    let mut observer = SessionLifecycleObserver::new(device.sync.clone());
    let driver = tokio::spawn(async move {
        observer.run(rx).await;
        observer
    });

    tx.send(SessionEvent::SignedIn(u1.clone())).await.unwrap();
    assert!(wait_for(&mut online, STREAM_TIMEOUT, |v| *v).await.unwrap());

    tx.send(SessionEvent::AppStateChanged(AppState::Background))
        .await
        .unwrap();
    assert!(!wait_for(&mut online, STREAM_TIMEOUT, |v| !*v).await.unwrap());

    tx.send(SessionEvent::AppStateChanged(AppState::Active))
        .await
        .unwrap();
    assert!(wait_for(&mut online, STREAM_TIMEOUT, |v| *v).await.unwrap());

    tx.send(SessionEvent::SignedOut).await.unwrap();
    drop(tx);
    let observer = driver.await.unwrap();

    assert!(observer.user().is_none());
    assert_eq!(status_of(&harness, &u1), PresenceState::Offline);
    assert!(!device.sync.profile_presence(&u1).await.unwrap().online);
}
