//! Events that can occur in a conversation

use crate::conversation::{Message, MessageId};
use crate::generator::GenerationError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        text: String,
    },
    UserCancel,

    // Store events
    TurnAppended {
        pending_id: MessageId,
        /// History snapshot to prompt from (placeholder excluded)
        history: Vec<Message>,
    },
    TurnRejected,

    // Generation events
    GenerationSucceeded {
        pending_id: MessageId,
        text: String,
    },
    GenerationFailed {
        pending_id: MessageId,
        error: GenerationError,
    },

    // Capability lifecycle
    GeneratorReady,
    GeneratorUnavailable {
        message: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserSubmit { .. } => "user_submit",
            Event::UserCancel => "user_cancel",
            Event::TurnAppended { .. } => "turn_appended",
            Event::TurnRejected => "turn_rejected",
            Event::GenerationSucceeded { .. } => "generation_succeeded",
            Event::GenerationFailed { .. } => "generation_failed",
            Event::GeneratorReady => "generator_ready",
            Event::GeneratorUnavailable { .. } => "generator_unavailable",
        }
    }
}
