//! Typing flag

use serde_json::Value;

use crate::value_objects::{ConversationId, StorePath, UserId};

/// Typing indicator of one user in one conversation.
///
/// Stored at `/typing/{conversationId}/{userId}`; the node exists (as `true`)
/// while the user is typing and is removed otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypingFlag {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

impl TypingFlag {
    #[must_use]
    pub fn new(conversation_id: ConversationId, user_id: UserId) -> Self {
        Self {
            conversation_id,
            user_id,
        }
    }

    /// Store path of this flag
    #[must_use]
    pub fn path(&self) -> StorePath {
        StorePath::typing(&self.conversation_id, &self.user_id)
    }

    /// Value written while typing (`None` removes the node)
    #[must_use]
    pub fn value(is_typing: bool) -> Option<Value> {
        is_typing.then_some(Value::Bool(true))
    }

    /// Read a stored node: present means typing, except an explicit `false`
    #[must_use]
    pub fn is_set(value: Option<&Value>) -> bool {
        !matches!(value, None | Some(Value::Null | Value::Bool(false)))
    }
}
