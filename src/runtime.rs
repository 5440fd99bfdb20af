//! Runtime for executing a conversation
//!
//! One task owns the conversation store and turn state and processes
//! events one at a time. Generation and capability loading run in
//! spawned tasks that report back through the event channel, so state is
//! never mutated concurrently.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;

use crate::conversation::{ConversationStore, Message, MessageId};
use crate::generator::GenerationClient;
use crate::prompt::{PromptBuilder, GREETING};
use crate::state_machine::{ConvState, Event, ModelStatus, TurnPhase};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

/// Immutable view of the conversation, republished after every mutation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub busy: bool,
    pub state: ConvState,
    pub model_status: ModelStatus,
    /// Sequence number of the newest update this snapshot already reflects
    pub last_seq: u64,
}

/// Events sent to subscribed clients
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageAppended {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    TurnPhase {
        phase: TurnPhase,
        pending_id: Option<MessageId>,
    },
    ModelStatus {
        status: ModelStatus,
    },
    Error {
        message: String,
    },
}

/// A `ChatEvent` tagged with its position in the update stream.
///
/// The snapshot carrying `last_seq >= seq` is published before the update
/// is broadcast, so a subscriber that reads the snapshot after subscribing
/// sees every change either in the snapshot or as an update.
#[derive(Debug, Clone)]
pub struct ChatUpdate {
    pub seq: u64,
    pub event: ChatEvent,
}

/// Reasons a submission is not forwarded to the runtime
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message is empty")]
    Blank,
    #[error("A reply is still being generated")]
    Busy,
    #[error("Conversation runtime has stopped")]
    Closed,
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ChatHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_rx: watch::Receiver<ConversationSnapshot>,
}

impl ChatHandle {
    /// Submit user text.
    ///
    /// Blank and busy checks run against the latest snapshot; the runtime
    /// re-checks and silently drops anything that slips through.
    pub async fn submit(&self, text: &str) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::Blank);
        }
        if self.snapshot_rx.borrow().busy {
            return Err(SubmitError::Busy);
        }
        self.send(Event::UserSubmit {
            text: text.to_string(),
        })
        .await
    }

    /// Abort the in-flight generation, if any
    pub async fn cancel(&self) -> Result<(), SubmitError> {
        self.send(Event::UserCancel).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    #[allow(dead_code)] // Used by tests to await settled turns
    pub fn watch(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn send(&self, event: Event) -> Result<(), SubmitError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| SubmitError::Closed)
    }
}

/// Start a conversation seeded with the greeting and begin loading the
/// generator in the background.
pub fn spawn_conversation(client: Arc<GenerationClient>, prompt: PromptBuilder) -> ChatHandle {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let store = ConversationStore::with_greeting(GREETING);

    let (event_tx, event_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);

    let runtime = ConversationRuntime::new(
        conversation_id.clone(),
        store,
        client,
        prompt,
        event_rx,
        event_tx.clone(),
        broadcast_tx.clone(),
    );
    let snapshot_rx = runtime.watch();

    runtime.warm_up();
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(conv_id = %conversation_id, "Conversation runtime finished");
    });

    ChatHandle {
        event_tx,
        broadcast_tx,
        snapshot_rx,
    }
}
