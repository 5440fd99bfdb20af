//! Pure state transition function
//!
//! Given the same state and event this always produces the same result,
//! with no I/O side effects. Turns are strictly sequential: a submission
//! is only accepted from `Idle`.

use super::{ConvState, Effect, Event, ModelStatus, TurnPhase};
use thiserror::Error;

/// Reply shown when generation fails
pub const GENERATION_FALLBACK: &str = "I ran into a hiccup while generating that. Please try again.";

/// Reply shown when the user aborts a generation
pub const CANCELLED_REPLY: &str = "Generation was cancelled.";

/// Notice appended when the capability could not be loaded
pub const INIT_FAILURE_NOTICE: &str =
    "I couldn't load the on-device model. Please refresh the page or check your network connection.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    BlankInput,
    #[error("A reply is still being generated, wait for it to finish")]
    Busy,
    #[error("Result for a turn that is no longer generating")]
    StaleResult,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Rejections a caller should treat as a silent no-op
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::BlankInput | Self::Busy | Self::StaleResult)
    }
}

/// Pure transition function
pub fn transition(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        (ConvState::Idle, Event::UserSubmit { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::BlankInput);
            }
            Ok(TransitionResult::new(ConvState::Submitted)
                .with_effect(Effect::AppendTurn {
                    text: text.to_string(),
                })
                .with_effect(Effect::notify_turn(TurnPhase::Submitted)))
        }

        (ConvState::Submitted | ConvState::Generating { .. }, Event::UserSubmit { .. }) => {
            Err(TransitionError::Busy)
        }

        (ConvState::Submitted, Event::TurnAppended { pending_id, history }) => {
            Ok(TransitionResult::new(ConvState::Generating {
                pending_id: pending_id.clone(),
            })
            .with_effect(Effect::RequestGeneration { pending_id, history })
            .with_effect(Effect::notify_turn(TurnPhase::Generating)))
        }

        // Store refused the turn; nothing was appended
        (ConvState::Submitted, Event::TurnRejected) => Ok(TransitionResult::new(ConvState::Idle)),

        // ============================================================
        // Generation results
        // ============================================================

        (ConvState::Generating { pending_id }, Event::GenerationSucceeded { pending_id: id, text })
            if *pending_id == id =>
        {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::SettleMessage { pending_id: id, text })
                .with_effect(Effect::notify_turn(TurnPhase::Settled)))
        }

        (ConvState::Generating { pending_id }, Event::GenerationFailed { pending_id: id, .. })
            if *pending_id == id =>
        {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::FailMessage {
                    pending_id: id,
                    text: GENERATION_FALLBACK.to_string(),
                })
                .with_effect(Effect::notify_turn(TurnPhase::Failed)))
        }

        (_, Event::GenerationSucceeded { .. } | Event::GenerationFailed { .. }) => {
            Err(TransitionError::StaleResult)
        }

        // ============================================================
        // Cancellation
        // ============================================================

        (ConvState::Generating { pending_id }, Event::UserCancel) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::AbortGeneration)
                .with_effect(Effect::FailMessage {
                    pending_id: pending_id.clone(),
                    text: CANCELLED_REPLY.to_string(),
                })
                .with_effect(Effect::notify_turn(TurnPhase::Cancelled)))
        }

        // Nothing in flight
        (ConvState::Idle, Event::UserCancel) => Ok(TransitionResult::new(ConvState::Idle)),

        // ============================================================
        // Capability lifecycle (state unchanged)
        // ============================================================

        (state, Event::GeneratorReady) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify_model(ModelStatus::Ready))),

        (state, Event::GeneratorUnavailable { .. }) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::AppendNotice {
                text: INIT_FAILURE_NOTICE.to_string(),
            })
            .with_effect(Effect::notify_model(ModelStatus::Failed))),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {state:?}",
            event.name()
        ))),
    }
}
