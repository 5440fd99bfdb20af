//! Conversation state types

use crate::conversation::MessageId;
use serde::{Deserialize, Serialize};

/// Turn state of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// No pending message, submissions accepted
    #[default]
    Idle,

    /// Submission accepted, user and placeholder being appended
    Submitted,

    /// Generation in flight for the placeholder
    Generating { pending_id: MessageId },
}

impl ConvState {
    /// A turn is in flight and new submissions are rejected
    pub fn is_busy(&self) -> bool {
        !matches!(self, ConvState::Idle)
    }

    pub fn pending_id(&self) -> Option<&MessageId> {
        match self {
            ConvState::Generating { pending_id } => Some(pending_id),
            _ => None,
        }
    }
}

/// Lifecycle phase of a single turn, reported to clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Submitted,
    Generating,
    Settled,
    Failed,
    Cancelled,
}

/// Load status of the generation capability
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    #[default]
    Loading,
    Ready,
    Failed,
}
