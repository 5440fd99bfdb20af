//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition(state, event)` returns the next state plus the effects the
//! runtime must execute. No I/O happens here.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ConvState, ModelStatus, TurnPhase};
#[allow(unused_imports)] // Public API re-exports
pub use transition::{
    transition, TransitionError, TransitionResult, CANCELLED_REPLY, GENERATION_FALLBACK,
    INIT_FAILURE_NOTICE,
};
