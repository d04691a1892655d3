//! Session lifecycle observer
//!
//! Maps sign-in/out and foreground/background transitions to presence calls.
//! The signed-in user is held here and passed explicitly to the synchronizer.

use presence_core::UserId;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use super::report::SyncReport;
use super::synchronizer::PresenceSynchronizer;

/// Foreground state of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Active,
    Inactive,
    Background,
}

impl AppState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Input to the observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(UserId),
    SignedOut,
    AppStateChanged(AppState),
}

#[derive(Debug)]
pub struct SessionLifecycleObserver {
    sync: PresenceSynchronizer,
    user: Option<UserId>,
    app_state: AppState,
}

impl SessionLifecycleObserver {
    /// Observer for a signed-out session in the foreground
    pub fn new(sync: PresenceSynchronizer) -> Self {
        Self {
            sync,
            user: None,
            app_state: AppState::Active,
        }
    }

    #[must_use]
    pub fn with_app_state(mut self, app_state: AppState) -> Self {
        self.app_state = app_state;
        self
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    /// Apply one event, awaiting every presence call it triggers
    #[instrument(skip(self))]
    pub async fn handle(&mut self, event: SessionEvent) -> Vec<SyncReport> {
        let mut reports = Vec::new();

        match event {
            SessionEvent::SignedIn(user_id) => {
                if let Some(previous) = self.user.take().filter(|u| *u != user_id) {
                    info!(user_id = %previous, "Switching user; marking previous user offline");
                    reports.push(self.sync.mark_offline(&previous).await);
                }
                reports.push(self.sync.mark_online(&user_id).await);
                self.user = Some(user_id);
            }
            SessionEvent::SignedOut => match self.user.take() {
                Some(user_id) => reports.push(self.sync.mark_offline(&user_id).await),
                None => debug!("Sign-out without a signed-in user"),
            },
            SessionEvent::AppStateChanged(next) => {
                let previous = std::mem::replace(&mut self.app_state, next);
                if let Some(user_id) = &self.user {
                    match (previous.is_active(), next.is_active()) {
                        (false, true) => reports.push(self.sync.mark_online(user_id).await),
                        (true, false) => reports.push(self.sync.mark_offline(user_id).await),
                        _ => {}
                    }
                }
            }
        }

        reports
    }

    /// Handle events until the sender side closes
    pub async fn run(&mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("Session event channel closed");
    }
}
