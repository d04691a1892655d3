//! Typing indicator for one user in one conversation
//!
//! Turns input-field changes into typing flag writes. Only transitions are
//! written: typing several characters in a row produces one write.

use presence_core::{ConversationId, TypingFlag, UserId};
use tracing::debug;

use super::report::EffectOutcome;
use super::synchronizer::PresenceSynchronizer;

pub struct TypingIndicator {
    sync: PresenceSynchronizer,
    flag: TypingFlag,
    typing: bool,
    closed: bool,
}

impl std::fmt::Debug for TypingIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingIndicator")
            .field("flag", &self.flag)
            .field("typing", &self.typing)
            .finish()
    }
}

impl TypingIndicator {
    pub fn new(sync: PresenceSynchronizer, conversation_id: ConversationId, user_id: UserId) -> Self {
        Self {
            sync,
            flag: TypingFlag::new(conversation_id, user_id),
            typing: false,
            closed: false,
        }
    }

    /// Whether the last requested state is typing
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// React to the input text changing.
    ///
    /// Returns the write outcome, or `None` when the typing state did not change.
    pub async fn input_changed(&mut self, text: &str) -> Option<EffectOutcome> {
        self.transition(!text.trim().is_empty()).await
    }

    /// The message was sent; the input is cleared
    pub async fn message_sent(&mut self) -> Option<EffectOutcome> {
        self.transition(false).await
    }

    /// Clear the flag and retire the indicator
    pub async fn close(mut self) -> Option<EffectOutcome> {
        let outcome = self.transition(false).await;
        self.closed = true;
        outcome
    }

    async fn transition(&mut self, typing: bool) -> Option<EffectOutcome> {
        if self.typing == typing {
            return None;
        }
        // Track the requested state even if the write fails; there is no retry.
        self.typing = typing;
        Some(
            self.sync
                .set_typing(&self.flag.conversation_id, &self.flag.user_id, typing)
                .await,
        )
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        if self.closed || !self.typing {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(flag = ?self.flag, "No runtime to clear typing flag on drop");
            return;
        };

        let sync = self.sync.clone();
        let flag = self.flag.clone();
        handle.spawn(async move {
            sync.set_typing(&flag.conversation_id, &flag.user_id, false)
                .await;
        });
    }
}
