//! Prompt construction
//!
//! The downstream generator is a plain sequence-completion model with no
//! structured chat API, so the prompt string is the whole conversational
//! contract. Label strings and ordering are part of that contract.

use crate::conversation::Message;

/// Persona block placed at the top of every prompt
pub const SYSTEM_PROMPT: &str = "You are MyFree Agent, a helpful and proactive personal AI assistant that runs locally in the browser. \
Provide concise, actionable answers across planning, productivity, wellness, and research topics. \
When useful, suggest next steps, checklists, or reminders. Avoid hallucinating facts you are not confident about. \
Keep responses under 200 words unless the user requests otherwise.";

/// Assistant message every session starts with
pub const GREETING: &str = "Hi! I'm your free personal AI agent. I run entirely in your browser, so your conversations stay private. How can I help today?";

/// Canned prompts offered as one-click shortcuts
pub const QUICK_START: [&str; 4] = [
    "Draft a daily routine to boost my focus.",
    "Plan a 30-minute workout I can do at home.",
    "Help me brainstorm a weekend project idea.",
    "Summarize the key points of a book I'm reading.",
];

/// Cue the generator continues from
pub const ASSISTANT_CUE: &str = "Assistant:";

/// Render history into a completion prompt.
///
/// Output is `{system}\n\n{Label}: {content}` lines joined by `\n`,
/// followed by a final `\nAssistant:` line.
pub fn build_prompt(history: &[Message], system_prompt: &str) -> String {
    let dialogue = history
        .iter()
        .map(|message| format!("{}: {}", message.role.label(), message.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{system_prompt}\n\n{dialogue}\n{ASSISTANT_CUE}")
}

/// Prompt assembly with an optional bounded history window
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    max_history_messages: Option<usize>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_history_messages: None,
        }
    }

    /// Keep only the newest `limit` history messages in each prompt
    pub fn with_history_window(mut self, limit: Option<usize>) -> Self {
        self.max_history_messages = limit.filter(|n| *n > 0);
        self
    }

    pub fn build(&self, history: &[Message]) -> String {
        let window = match self.max_history_messages {
            Some(limit) if history.len() > limit => {
                tracing::debug!(
                    total = history.len(),
                    kept = limit,
                    "Truncating prompt history to window"
                );
                history.get(history.len() - limit..).unwrap_or(history)
            }
            _ => history,
        };
        build_prompt(window, &self.system_prompt)
    }
}
