//! Message and conversation key types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role, as used by chat model APIs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Namespace for all per-conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Conversation kind, e.g. `service` or `pdf`.
    pub category: String,
    /// Caller-chosen conversation id.
    pub conversation_id: String,
}

impl ConversationKey {
    #[must_use]
    pub fn new(category: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.conversation_id)
    }
}

/// Full history contents: category -> conversation id -> messages.
pub type HistorySnapshot = BTreeMap<String, BTreeMap<String, Vec<Message>>>;
