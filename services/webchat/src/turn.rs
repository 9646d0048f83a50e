use chat_session::ChatSession;
use thiserror::Error;
use tracing::info;

use crate::provider::ChatBackend;

#[derive(Debug, Error)]
pub enum TurnError {
    /// Rejected before any state mutation; a client input error.
    #[error("Empty message")]
    EmptyMessage,
    /// Backend call failed mid-turn; the history has been rolled back.
    #[error("{0}")]
    Backend(String),
}

/// Run one conversation turn: append the user message, send the entire
/// accumulated history to the backend, append the reply. All-or-nothing:
/// any failure rolls the history back to its pre-turn state, so it never
/// ends in an unanswered user message.
pub async fn send_turn(
    session: &mut ChatSession,
    backend: &dyn ChatBackend,
    model: &str,
    user_text: &str,
) -> Result<String, TurnError> {
    if user_text.is_empty() {
        return Err(TurnError::EmptyMessage);
    }

    info!(message = user_text, "received message");

    let checkpoint = session.checkpoint();
    session.push_user(user_text);

    match backend.chat(model, session.messages()).await {
        Ok(reply) => {
            session.push_assistant(reply.clone());
            let preview: String = reply.chars().take(50).collect();
            info!(reply = %preview, "sending response");
            Ok(reply)
        }
        Err(e) => {
            session.rollback_to(checkpoint);
            Err(TurnError::Backend(e.to_string()))
        }
    }
}
