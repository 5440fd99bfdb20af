//! Conversation runtime executor

use super::{ChatEvent, ChatUpdate, ConversationSnapshot};
use crate::conversation::{ConversationStore, Message, MessageId};
use crate::generator::{GenerationClient, GenerationError};
use crate::prompt::PromptBuilder;
use crate::state_machine::{
    transition, ConvState, Effect, Event, ModelStatus, TransitionError, TurnPhase,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Owns the conversation and drives it through the state machine
pub struct ConversationRuntime {
    conversation_id: String,
    state: ConvState,
    store: ConversationStore,
    model_status: ModelStatus,
    client: Arc<GenerationClient>,
    prompt: PromptBuilder,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    /// Sequence number of the last broadcast update
    seq: u64,
    /// Token to cancel the running generation
    generation_cancel: Option<CancellationToken>,
}

impl ConversationRuntime {
    pub fn new(
        conversation_id: String,
        store: ConversationStore,
        client: Arc<GenerationClient>,
        prompt: PromptBuilder,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<ChatUpdate>,
    ) -> Self {
        let state = ConvState::Idle;
        let model_status = if client.is_ready() {
            ModelStatus::Ready
        } else {
            ModelStatus::Loading
        };
        let (snapshot_tx, _) = watch::channel(ConversationSnapshot {
            conversation_id: conversation_id.clone(),
            messages: store.messages(),
            busy: store.is_busy(),
            state: state.clone(),
            model_status,
            last_seq: 0,
        });

        Self {
            conversation_id,
            state,
            store,
            model_status,
            client,
            prompt,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            seq: 0,
            generation_cancel: None,
        }
    }

    pub fn watch(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    #[allow(dead_code)] // Inspected by tests
    pub fn state(&self) -> &ConvState {
        &self.state
    }

    #[allow(dead_code)] // Inspected by tests
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Start loading the generator so the first turn does not pay for it.
    /// Reports the outcome back as `GeneratorReady`/`GeneratorUnavailable`.
    pub fn warm_up(&self) {
        let client = self.client.clone();
        let event_tx = self.event_tx.clone();
        tracing::info!(
            conv_id = %self.conversation_id,
            model = %client.spec().model_id,
            "Warming up generator"
        );
        tokio::spawn(async move {
            let event = match client.ensure_ready().await {
                Ok(_) => Event::GeneratorReady,
                Err(e) => Event::GeneratorUnavailable { message: e.message },
            };
            let _ = event_tx.send(event).await;
        });
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.conversation_id, "Starting conversation runtime");

        while self.process_next().await {}

        tracing::info!(conv_id = %self.conversation_id, "Conversation runtime stopped");
    }

    /// Wait for the next event and process it. Returns false once the
    /// channel is closed.
    pub(crate) async fn process_next(&mut self) -> bool {
        let Some(event) = self.event_rx.recv().await else {
            return false;
        };

        match self.process_event(event) {
            Ok(()) => {}
            Err(e) if e.is_noop() => {
                tracing::debug!(conv_id = %self.conversation_id, reason = %e, "Event ignored");
            }
            Err(e) => {
                tracing::warn!(conv_id = %self.conversation_id, error = %e, "Error handling event");
                self.broadcast(ChatEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        true
    }

    pub(crate) fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Effects may produce follow-up events (e.g. the appended turn)
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            tracing::debug!(
                conv_id = %self.conversation_id,
                event = current_event.name(),
                state = ?self.state,
                "Processing event"
            );

            match &current_event {
                Event::GenerationFailed { pending_id, error } => {
                    tracing::warn!(
                        conv_id = %self.conversation_id,
                        %pending_id,
                        kind = error.kind.as_str(),
                        error = %error,
                        "Generation failed"
                    );
                }
                Event::GeneratorUnavailable { message } => {
                    tracing::warn!(conv_id = %self.conversation_id, error = %message, "Generator unavailable");
                }
                _ => {}
            }

            // Pure state transition
            let result = transition(&self.state, current_event)?;
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }
        }

        debug_assert_eq!(self.state.is_busy(), self.store.is_busy());
        self.publish_snapshot();
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendTurn { text } => {
                let Some(turn) = self.store.append_user_turn(&text) else {
                    tracing::warn!(conv_id = %self.conversation_id, "Store refused turn");
                    return Some(Event::TurnRejected);
                };
                self.emit_message(&turn.user_id, true);
                self.emit_message(&turn.pending_id, true);
                Some(Event::TurnAppended {
                    pending_id: turn.pending_id,
                    history: turn.history,
                })
            }

            Effect::RequestGeneration {
                pending_id,
                history,
            } => {
                self.spawn_generation(pending_id, &history);
                None
            }

            Effect::AbortGeneration => {
                if let Some(token) = self.generation_cancel.take() {
                    tracing::info!(conv_id = %self.conversation_id, "Aborting generation");
                    token.cancel();
                }
                None
            }

            Effect::SettleMessage { pending_id, text } => {
                self.generation_cancel = None;
                if self.store.settle_turn(&pending_id, &text) {
                    self.emit_message(&pending_id, false);
                }
                self.refresh_model_status();
                None
            }

            Effect::FailMessage { pending_id, text } => {
                self.generation_cancel = None;
                if self.store.fail_turn(&pending_id, &text) {
                    self.emit_message(&pending_id, false);
                }
                self.refresh_model_status();
                None
            }

            Effect::AppendNotice { text } => {
                let id = self.store.append_notice(&text);
                self.emit_message(&id, true);
                None
            }

            Effect::NotifyTurn { phase } => {
                let pending_id = match phase {
                    TurnPhase::Generating => self.state.pending_id().cloned(),
                    _ => None,
                };
                self.broadcast(ChatEvent::TurnPhase { phase, pending_id });
                None
            }

            Effect::NotifyModel { status } => {
                self.set_model_status(status);
                None
            }
        }
    }

    fn spawn_generation(&mut self, pending_id: MessageId, history: &[Message]) {
        let prompt = self.prompt.build(history);
        let client = self.client.clone();
        let event_tx = self.event_tx.clone();
        let token = CancellationToken::new();
        self.generation_cancel = Some(token.clone());

        tracing::info!(
            conv_id = %self.conversation_id,
            %pending_id,
            history_len = history.len(),
            prompt_chars = prompt.len(),
            "Requesting generation"
        );

        tokio::spawn(async move {
            let result = tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!(%pending_id, "Generation task cancelled");
                    Err(GenerationError::cancelled("Generation aborted by user"))
                }
                result = client.generate(&prompt) => result,
            };
            let event = match result {
                Ok(text) => Event::GenerationSucceeded { pending_id, text },
                Err(error) => {
                    if error.is_initialization() {
                        tracing::warn!(%pending_id, error = %error, "Generator still unavailable");
                    }
                    Event::GenerationFailed { pending_id, error }
                }
            };
            // After a cancel the turn is already resolved; the runtime drops this as stale
            let _ = event_tx.send(event).await;
        });
    }

    fn set_model_status(&mut self, status: ModelStatus) {
        if self.model_status == status {
            return;
        }
        tracing::info!(conv_id = %self.conversation_id, ?status, "Model status changed");
        self.model_status = status;
        self.broadcast(ChatEvent::ModelStatus { status });
    }

    /// A turn can load the generator after a failed warm-up, whatever the
    /// outcome of the generation itself
    fn refresh_model_status(&mut self) {
        if self.model_status != ModelStatus::Ready && self.client.is_ready() {
            self.set_model_status(ModelStatus::Ready);
        }
    }

    fn emit_message(&mut self, id: &MessageId, appended: bool) {
        let Some(message) = self.store.get(id).cloned() else {
            return;
        };
        let event = if appended {
            ChatEvent::MessageAppended { message }
        } else {
            ChatEvent::MessageUpdated { message }
        };
        self.broadcast(event);
    }

    /// Number the update, publish a snapshot that already reflects it, then
    /// send it to subscribers
    fn broadcast(&mut self, event: ChatEvent) {
        self.seq += 1;
        self.publish_snapshot();
        let _ = self.broadcast_tx.send(ChatUpdate {
            seq: self.seq,
            event,
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(ConversationSnapshot {
            conversation_id: self.conversation_id.clone(),
            messages: self.store.messages(),
            busy: self.store.is_busy(),
            state: self.state.clone(),
            model_status: self.model_status,
            last_seq: self.seq,
        });
    }
}
