//! Conversation store
//!
//! Holds the ordered message history of a single chat session. Messages
//! are only ever appended or patched in place; the pending assistant
//! placeholder of the in-flight turn is excluded from the history view
//! used to build prompts.

mod message;
mod store;


#[allow(unused_imports)] // Public API re-exports
pub use message::{Message, MessageId, MessageKind, Role};
#[allow(unused_imports)]
pub use store::{AppendedTurn, ConversationStore};
