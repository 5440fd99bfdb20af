//! Effects produced by state transitions

use super::state::{ModelStatus, TurnPhase};
use crate::conversation::{Message, MessageId};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append the user message and a pending assistant placeholder
    AppendTurn { text: String },

    /// Ask the generation client for a reply (spawns as background task)
    RequestGeneration {
        pending_id: MessageId,
        history: Vec<Message>,
    },

    /// Abort the in-flight generation
    AbortGeneration,

    /// Patch the placeholder with the generated reply
    SettleMessage { pending_id: MessageId, text: String },

    /// Patch the placeholder with a fallback
    FailMessage { pending_id: MessageId, text: String },

    /// Append a system-level notice
    AppendNotice { text: String },

    /// Notify connected clients of a turn phase change
    NotifyTurn { phase: TurnPhase },

    /// Notify connected clients of a capability status change
    NotifyModel { status: ModelStatus },
}

impl Effect {
    pub fn notify_turn(phase: TurnPhase) -> Self {
        Effect::NotifyTurn { phase }
    }

    pub fn notify_model(status: ModelStatus) -> Self {
        Effect::NotifyModel { status }
    }
}
