//! Per-effect outcome reporting for presence operations

use presence_core::{DomainError, PresenceState, UserId};

/// One independently attempted side effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Write of `/status/{user}`
    PresenceWrite,
    /// Registration of the offline fallback on `/status/{user}`
    DisconnectFallback,
    /// Merge of `online`/`lastSeen` into `users/{user}`
    ProfileMirror,
    /// Write or removal of `/typing/{conversation}/{user}`
    TypingWrite,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PresenceWrite => "presence_write",
            Self::DisconnectFallback => "disconnect_fallback",
            Self::ProfileMirror => "profile_mirror",
            Self::TypingWrite => "typing_write",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    Applied,
    Failed { code: &'static str, message: String },
}

impl EffectOutcome {
    pub fn from_result<T>(result: &Result<T, DomainError>) -> Self {
        match result {
            Ok(_) => Self::Applied,
            Err(e) => Self::Failed {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// What `mark_online` / `mark_offline` actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub user_id: UserId,
    pub target: PresenceState,
    pub effects: Vec<(Effect, EffectOutcome)>,
}

impl SyncReport {
    pub fn new(user_id: UserId, target: PresenceState) -> Self {
        Self {
            user_id,
            target,
            effects: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, effect: Effect, outcome: EffectOutcome) {
        self.effects.push((effect, outcome));
    }

    /// Outcome of one effect, if it was attempted
    pub fn outcome(&self, effect: Effect) -> Option<&EffectOutcome> {
        self.effects
            .iter()
            .find(|(e, _)| *e == effect)
            .map(|(_, outcome)| outcome)
    }

    /// True when every attempted effect was applied
    pub fn is_complete(&self) -> bool {
        self.effects.iter().all(|(_, outcome)| outcome.is_applied())
    }

    pub fn failures(&self) -> impl Iterator<Item = (Effect, &EffectOutcome)> {
        self.effects
            .iter()
            .filter(|(_, outcome)| !outcome.is_applied())
            .map(|(effect, outcome)| (*effect, outcome))
    }
}
