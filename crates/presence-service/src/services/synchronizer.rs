//! Presence synchronizer
//!
//! Writes a user's presence record and typing flags to the ephemeral store,
//! registers the disconnect fallback, and mirrors the online flag into the
//! profile store. Every effect is best-effort: failures are logged and
//! reported, never returned as errors.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use presence_core::{
    ConversationId, DisconnectFallback, PresenceRecord, PresenceState, ProfileOnlineMirror,
    ProfilePatch, StorePath, StoreResult, TypingFlag, UserId, USERS_COLLECTION,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::context::PresenceContext;
use super::report::{Effect, EffectOutcome, SyncReport};

/// Combined presence of the other participant of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterpartStatus {
    pub online: bool,
    pub typing: bool,
}

enum CounterpartUpdate {
    Online(bool),
    Typing(bool),
}

/// Presence synchronizer
///
/// Cheap to clone; clones share the client-local state table.
#[derive(Clone)]
pub struct PresenceSynchronizer {
    ctx: PresenceContext,
    local: Arc<DashMap<UserId, PresenceState>>,
}

impl std::fmt::Debug for PresenceSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSynchronizer")
            .field("tracked_users", &self.local.len())
            .finish()
    }
}

impl PresenceSynchronizer {
    pub fn new(ctx: PresenceContext) -> Self {
        Self {
            ctx,
            local: Arc::new(DashMap::new()),
        }
    }

    pub fn context(&self) -> &PresenceContext {
        &self.ctx
    }

    /// Mark a user online.
    ///
    /// Writes `{state: online}`, registers the offline fallback on the same
    /// path, and merges `{online: true}` into the profile. The three effects
    /// run concurrently and independently.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_online(&self, user_id: &UserId) -> SyncReport {
        self.local.insert(user_id.clone(), PresenceState::Online);

        let path = StorePath::status(user_id);
        let record = PresenceRecord::online(self.ctx.clock().now_millis());
        let fallback = DisconnectFallback::offline_presence(user_id);
        let patch = ProfilePatch::went_online();

        let (write, hook, mirror) = future::join3(
            self.ctx.ephemeral().set(&path, Some(record.to_value())),
            self.ctx
                .ephemeral()
                .on_disconnect_set(&fallback.path, fallback.value.clone()),
            self.ctx
                .profiles()
                .merge_write(USERS_COLLECTION, user_id.as_str(), &patch),
        )
        .await;

        let mut report = SyncReport::new(user_id.clone(), PresenceState::Online);
        settle(&mut report, Effect::PresenceWrite, write);
        settle(&mut report, Effect::DisconnectFallback, hook);
        settle(&mut report, Effect::ProfileMirror, mirror);

        debug!(complete = report.is_complete(), "Marked online");
        report
    }

    /// Mark a user offline.
    ///
    /// Writes `{state: offline}` and merges `{online: false, lastSeen: <server
    /// time>}` into the profile. The registered fallback stays in place.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_offline(&self, user_id: &UserId) -> SyncReport {
        self.local.insert(user_id.clone(), PresenceState::Offline);

        let path = StorePath::status(user_id);
        let record = PresenceRecord::offline(self.ctx.clock().now_millis());
        let patch = ProfilePatch::went_offline();

        let (write, mirror) = future::join(
            self.ctx.ephemeral().set(&path, Some(record.to_value())),
            self.ctx
                .profiles()
                .merge_write(USERS_COLLECTION, user_id.as_str(), &patch),
        )
        .await;

        let mut report = SyncReport::new(user_id.clone(), PresenceState::Offline);
        settle(&mut report, Effect::PresenceWrite, write);
        settle(&mut report, Effect::ProfileMirror, mirror);

        debug!(complete = report.is_complete(), "Marked offline");
        report
    }

    /// Set or clear a typing flag.
    ///
    /// While set, a fallback removing the flag is registered so an abrupt
    /// disconnect does not leave it behind.
    #[instrument(skip(self), fields(conversation_id = %conversation_id, user_id = %user_id))]
    pub async fn set_typing(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        is_typing: bool,
    ) -> EffectOutcome {
        let path = TypingFlag::new(conversation_id.clone(), user_id.clone()).path();
        let store = self.ctx.ephemeral();

        let write = store.set(&path, TypingFlag::value(is_typing)).await;
        if let Err(e) = &write {
            warn!(effect = %Effect::TypingWrite, error = %e, "Typing write failed");
        }

        let hook = if is_typing {
            let fallback = DisconnectFallback::remove(path.clone());
            store.on_disconnect_set(&fallback.path, fallback.value).await
        } else {
            store.cancel_on_disconnect(&path).await
        };
        if let Err(e) = hook {
            warn!(effect = %Effect::DisconnectFallback, error = %e, "Typing fallback update failed");
        }

        EffectOutcome::from_result(&write)
    }

    /// Stream of whether a user is online.
    ///
    /// Yields the current state first, then one value per change. The stream
    /// does not end; drop it to unsubscribe.
    pub async fn observe_online(&self, user_id: &UserId) -> BoxStream<'static, bool> {
        self.observe(StorePath::status(user_id), |value| {
            PresenceRecord::state_of(value).is_online()
        })
        .await
    }

    /// Stream of whether a user is typing in a conversation
    pub async fn observe_typing(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> BoxStream<'static, bool> {
        self.observe(StorePath::typing(conversation_id, user_id), TypingFlag::is_set)
            .await
    }

    /// Merged online and typing view of a conversation participant.
    ///
    /// Emits once both parts are known and again whenever either changes.
    pub async fn observe_counterpart(
        &self,
        conversation_id: &ConversationId,
        counterpart: &UserId,
    ) -> BoxStream<'static, CounterpartStatus> {
        let online = self
            .observe_online(counterpart)
            .await
            .map(CounterpartUpdate::Online);
        let typing = self
            .observe_typing(conversation_id, counterpart)
            .await
            .map(CounterpartUpdate::Typing);

        stream::select(online, typing)
            .scan((None, None), |known, update| {
                match update {
                    CounterpartUpdate::Online(online) => known.0 = Some(online),
                    CounterpartUpdate::Typing(typing) => known.1 = Some(typing),
                }
                let status = match *known {
                    (Some(online), Some(typing)) => Some(CounterpartStatus { online, typing }),
                    _ => None,
                };
                future::ready(Some(status))
            })
            .filter_map(future::ready)
            .boxed()
    }

    /// Read back the durable online mirror of a user
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn profile_presence(&self, user_id: &UserId) -> Option<ProfileOnlineMirror> {
        match self
            .ctx
            .profiles()
            .get_document(USERS_COLLECTION, user_id.as_str())
            .await
        {
            Ok(document) => document.as_ref().map(ProfileOnlineMirror::from_document),
            Err(e) => {
                warn!(error = %e, "Profile read failed");
                None
            }
        }
    }

    /// Client-local view of a user's presence (Offline until marked)
    pub fn local_state(&self, user_id: &UserId) -> PresenceState {
        self.local
            .get(user_id)
            .map(|state| *state)
            .unwrap_or_default()
    }

    async fn observe<F>(&self, path: StorePath, read: F) -> BoxStream<'static, bool>
    where
        F: Fn(Option<&Value>) -> bool + Send + 'static,
    {
        match self.ctx.ephemeral().subscribe(&path).await {
            Ok(subscription) => subscription
                .map(move |snapshot| read(snapshot.val()))
                .chain(stream::pending())
                .boxed(),
            Err(e) => {
                warn!(path = %path, error = %e, "Subscribe failed; stream stays silent");
                stream::pending().boxed()
            }
        }
    }
}

fn settle(report: &mut SyncReport, effect: Effect, result: StoreResult<()>) {
    if let Err(e) = &result {
        warn!(
            user_id = %report.user_id,
            effect = %effect,
            code = e.code(),
            store_failure = e.is_store_failure(),
            error = %e,
            "Presence effect failed"
        );
    }
    report.record(effect, EffectOutcome::from_result(&result));
}
