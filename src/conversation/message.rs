//! Message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque message identifier, unique per message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Message role, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when the message is rendered into a prompt
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Where a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Part of the dialogue (greeting, user turn, assistant reply)
    #[default]
    Chat,
    /// System-level notice shown with the assistant role
    Notice,
}

/// A single conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::settled(Role::User, content.into(), MessageKind::Chat)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::settled(Role::Assistant, content.into(), MessageKind::Chat)
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Self::settled(Role::Assistant, content.into(), MessageKind::Notice)
    }

    /// Empty assistant placeholder for the in-flight turn
    pub fn pending_assistant() -> Self {
        Self {
            pending: true,
            ..Self::settled(Role::Assistant, String::new(), MessageKind::Chat)
        }
    }

    fn settled(role: Role, content: String, kind: MessageKind) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            pending: false,
            kind,
            created_at: Utc::now(),
        }
    }
}
