//! In-memory conversation store

use super::message::{Message, MessageId};
use std::collections::HashMap;

/// Ids and prompt history produced by an accepted user turn
#[derive(Debug, Clone)]
pub struct AppendedTurn {
    pub user_id: MessageId,
    pub pending_id: MessageId,
    /// History at the moment the placeholder was created: includes the
    /// new user message, excludes the placeholder itself.
    pub history: Vec<Message>,
}

/// Ordered, append-only message history with keyed lookup
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    order: Vec<MessageId>,
    messages: HashMap<MessageId, Message>,
    pending: Option<MessageId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session seeded with an assistant greeting
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut store = Self::new();
        store.push(Message::assistant(greeting));
        store
    }

    /// Append a user message and its pending assistant placeholder.
    ///
    /// Returns `None` without touching the store when `text` is blank
    /// after trimming or another turn is still in flight.
    pub fn append_user_turn(&mut self, text: &str) -> Option<AppendedTurn> {
        let text = text.trim();
        if text.is_empty() || self.is_busy() {
            return None;
        }

        let user = Message::user(text);
        let user_id = user.id.clone();
        self.push(user);

        let history = self.history_view();

        let placeholder = Message::pending_assistant();
        let pending_id = placeholder.id.clone();
        self.push(placeholder);
        self.pending = Some(pending_id.clone());

        Some(AppendedTurn {
            user_id,
            pending_id,
            history,
        })
    }

    /// Replace the pending placeholder with the generated reply
    pub fn settle_turn(&mut self, pending_id: &MessageId, text: &str) -> bool {
        self.resolve(pending_id, text)
    }

    /// Replace the pending placeholder with a fallback after a failed generation
    pub fn fail_turn(&mut self, pending_id: &MessageId, fallback_text: &str) -> bool {
        self.resolve(pending_id, fallback_text)
    }

    /// Append a system-level notice (assistant role, never pending)
    pub fn append_notice(&mut self, text: &str) -> MessageId {
        let notice = Message::notice(text);
        let id = notice.id.clone();
        self.push(notice);
        id
    }

    /// Ordered messages excluding any pending placeholder
    pub fn history_view(&self) -> Vec<Message> {
        self.iter().filter(|m| !m.pending).cloned().collect()
    }

    /// All messages in display order
    pub fn messages(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_id(&self) -> Option<&MessageId> {
        self.pending.as_ref()
    }

    fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(|id| self.messages.get(id))
    }

    fn push(&mut self, message: Message) {
        self.order.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
    }

    fn resolve(&mut self, pending_id: &MessageId, text: &str) -> bool {
        if self.pending.as_ref() != Some(pending_id) {
            tracing::debug!(%pending_id, "Ignoring resolve for message that is not pending");
            return false;
        }
        let Some(message) = self.messages.get_mut(pending_id) else {
            return false;
        };
        message.content = text.to_string();
        message.pending = false;
        self.pending = None;
        true
    }
}
