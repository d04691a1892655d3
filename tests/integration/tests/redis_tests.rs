//! Redis ephemeral store tests
//!
//! These tests require:
//! - Running Redis instance
//! - Environment variable: REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test redis_tests

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{
    check_redis_env, fast_redis_config, lapse_liveness, next_within, redis_client, redis_pool,
    unique_conversation, unique_user, wait_for, STREAM_TIMEOUT,
};
use presence_cache::ephemeral::keys;
use presence_cache::LivenessSweeper;
use presence_core::{
    server_timestamp, EphemeralStore, PresenceRecord, PresenceState, StorePath,
};
use presence_db::MemoryProfileStore;
use presence_service::{PresenceContext, PresenceSynchronizer};
use redis::AsyncCommands;
use serde_json::json;

fn synchronizer(store: Arc<dyn EphemeralStore>) -> PresenceSynchronizer {
    let ctx = PresenceContext::builder()
        .ephemeral(store)
        .profiles(Arc::new(MemoryProfileStore::new()))
        .build()
        .unwrap();
    PresenceSynchronizer::new(ctx)
}

#[tokio::test]
async fn test_set_get_and_remove() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let store = redis_client(&pool).await.unwrap();
    let path = StorePath::status(&unique_user("u"));

    store.set(&path, Some(json!({"state": "online", "lastChanged": 1}))).await.unwrap();
    assert_eq!(
        store.get(&path).await.unwrap(),
        Some(json!({"state": "online", "lastChanged": 1}))
    );

    store.set(&path, None).await.unwrap();
    assert_eq!(store.get(&path).await.unwrap(), None);
    store.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_server_timestamp_resolved_on_write() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let store = redis_client(&pool).await.unwrap();
    let path = StorePath::status(&unique_user("u"));

    store
        .set(&path, Some(json!({"state": "offline", "lastChanged": server_timestamp()})))
        .await
        .unwrap();

    let record = PresenceRecord::from_value(&store.get(&path).await.unwrap().unwrap()).unwrap();
    assert!(record.last_changed > 1_600_000_000_000);
    store.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_subscription_sees_initial_value_then_changes() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let writer = redis_client(&pool).await.unwrap();
    let reader = redis_client(&pool).await.unwrap();
    let path = StorePath::typing(&unique_conversation(), &unique_user("u"));

    let mut sub = reader.subscribe(&path).await.unwrap();
    assert_eq!(next_within(&mut sub, STREAM_TIMEOUT).await.unwrap().value, None);

    writer.set(&path, Some(json!(true))).await.unwrap();
    assert_eq!(
        next_within(&mut sub, STREAM_TIMEOUT).await.unwrap().value,
        Some(json!(true))
    );

    writer.set(&path, None).await.unwrap();
    assert_eq!(next_within(&mut sub, STREAM_TIMEOUT).await.unwrap().value, None);

    sub.unsubscribe();
    writer.disconnect().await.unwrap();
    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_graceful_disconnect_applies_fallbacks() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let client = redis_client(&pool).await.unwrap();
    let observer = redis_client(&pool).await.unwrap();
    let user = unique_user("u");

    let sync = synchronizer(client.clone());
    sync.mark_online(&user).await;

    let fired = client.disconnect().await.unwrap();
    assert_eq!(fired, 1);
    assert_eq!(client.disconnect().await.unwrap(), 0);

    let value = observer.get(&StorePath::status(&user)).await.unwrap();
    assert_eq!(PresenceRecord::state_of(value.as_ref()), PresenceState::Offline);
    observer.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_fallback_does_not_fire() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let client = redis_client(&pool).await.unwrap();
    let path = StorePath::typing(&unique_conversation(), &unique_user("u"));

    client.on_disconnect_set(&path, None).await.unwrap();
    client.cancel_on_disconnect(&path).await.unwrap();
    client.set(&path, Some(json!(true))).await.unwrap();

    assert_eq!(client.disconnect().await.unwrap(), 0);

    let observer = redis_client(&pool).await.unwrap();
    assert_eq!(observer.get(&path).await.unwrap(), Some(json!(true)));
    observer.set(&path, None).await.unwrap();
    observer.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_sweeper_fires_fallbacks_of_lapsed_client() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let observer = redis_client(&pool).await.unwrap();
    let user = unique_user("u2");

    let client = redis_client(&pool).await.unwrap();
    let sync = synchronizer(client.clone());
    sync.mark_online(&user).await;

    let watcher = synchronizer(observer.clone());
    let mut online = watcher.observe_online(&user).await;
    assert!(next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    // Abrupt loss: the heartbeat stops and the liveness key lapses.
    drop(sync);
    drop(client);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let sweeper = LivenessSweeper::new(pool.clone(), Duration::from_secs(1));
    let stats = sweeper.sweep_once().await.unwrap();
    // Another sweeper may have claimed the client first; the fallback fires either way.
    assert!(stats.checked >= 1);

    assert!(!wait_for(&mut online, STREAM_TIMEOUT, |v| !*v).await.unwrap());
    observer.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_heartbeat_keeps_client_alive() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let client = redis_client(&pool).await.unwrap();
    let user = unique_user("u");
    let sync = synchronizer(client.clone());
    sync.mark_online(&user).await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    LivenessSweeper::new(pool.clone(), Duration::from_secs(1))
        .sweep_once()
        .await
        .unwrap();

    let value = client.get(&StorePath::status(&user)).await.unwrap();
    assert_eq!(PresenceRecord::state_of(value.as_ref()), PresenceState::Online);

    sync.mark_offline(&user).await;
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_reregistered_client_stays_online_across_sweeps() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let client = redis_client(&pool).await.unwrap();
    let observer = redis_client(&pool).await.unwrap();
    let user = unique_user("u");
    let status = StorePath::status(&user);
    let sync = synchronizer(client.clone());
    let sweeper = LivenessSweeper::new(pool.clone(), Duration::from_secs(1));

    assert!(sync.mark_online(&user).await.is_complete());

    // Stalled past the TTL: the sweeper applies the offline fallback.
    lapse_liveness(&pool, client.client_id()).await.unwrap();
    sweeper.sweep_once().await.unwrap();
    let value = observer.get(&status).await.unwrap();
    assert_eq!(PresenceRecord::state_of(value.as_ref()), PresenceState::Offline);

    // The heartbeat re-registers the client, which then comes back online.
    tokio::time::sleep(fast_redis_config().heartbeat_interval * 3).await;
    assert!(sync.mark_online(&user).await.is_complete());

    for _ in 0..3 {
        sweeper.sweep_once().await.unwrap();
        let value = observer.get(&status).await.unwrap();
        assert_eq!(PresenceRecord::state_of(value.as_ref()), PresenceState::Online);
    }

    // The fallback registered after re-registration was kept.
    assert_eq!(client.disconnect().await.unwrap(), 1);
    let value = observer.get(&status).await.unwrap();
    assert_eq!(PresenceRecord::state_of(value.as_ref()), PresenceState::Offline);
    observer.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_graceful_disconnect_clears_liveness() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let client = redis_client(&pool).await.unwrap();
    let client_id = client.client_id().to_string();
    client.disconnect().await.unwrap();

    let mut conn = pool.get().await.unwrap();
    let alive: bool = conn.exists(keys::alive_key(&client_id)).await.unwrap();
    assert!(!alive);
}

#[tokio::test]
async fn test_synchronizer_over_redis() {
    if !check_redis_env() {
        return;
    }
    let pool = redis_pool().await.unwrap();
    let a = redis_client(&pool).await.unwrap();
    let b = redis_client(&pool).await.unwrap();
    let user = unique_user("u1");
    let conversation = unique_conversation();

    let writer = synchronizer(a.clone());
    let watcher = synchronizer(b.clone());

    let mut online = watcher.observe_online(&user).await;
    let mut typing = watcher.observe_typing(&conversation, &user).await;
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());
    assert!(!next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());

    assert!(writer.mark_online(&user).await.is_complete());
    assert!(next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    writer.set_typing(&conversation, &user, true).await;
    writer.set_typing(&conversation, &user, false).await;
    assert!(next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());
    assert!(!next_within(&mut typing, STREAM_TIMEOUT).await.unwrap());

    writer.mark_offline(&user).await;
    assert!(!next_within(&mut online, STREAM_TIMEOUT).await.unwrap());

    a.disconnect().await.unwrap();
    b.disconnect().await.unwrap();
}
