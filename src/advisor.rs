//! Free-form trip advisor conversation

use crate::narrative::{ChatMessage, ChatRole, NarrativeGenerator, NARRATIVE_MAX_TOKENS};
use tracing::error;

pub const ADVISOR_SYSTEM_PROMPT: &str = "You are a helpful trip advisor AI. Remember the user's preferences, and avoid asking repetitive questions. When giving itineraries, make sure to personalize based on the given preferences, such as group size, budget, and specific interests.";

/// Reply recorded when the model call fails
pub const ADVISOR_ERROR_REPLY: &str = "Sorry, there was an error processing your request.";

/// Conversation history with the advisor. The full history is resent on
/// every turn.
#[derive(Debug, Clone, Default)]
pub struct TripAdvisorChat {
    history: Vec<ChatMessage>,
}

impl TripAdvisorChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user turn and record the reply. Blank input is ignored and
    /// returns `None`.
    pub async fn send(&mut self, narrator: &dyn NarrativeGenerator, input: &str) -> Option<&str> {
        if input.trim().is_empty() {
            return None;
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(ADVISOR_SYSTEM_PROMPT));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(input));

        self.history.push(ChatMessage::user(input));

        let reply = match narrator.generate(&messages, NARRATIVE_MAX_TOKENS).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, model = narrator.model_name(), "Trip advisor request failed");
                ADVISOR_ERROR_REPLY.to_string()
            }
        };
        self.history.push(ChatMessage::assistant(reply));

        self.history
            .last()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
    }
}
