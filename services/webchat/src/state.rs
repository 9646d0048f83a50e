use chat_session::ChatSession;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::provider::ChatBackend;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// The single process-wide conversation. The mutex is held across the
    /// whole append -> backend call -> append-or-rollback sequence so two
    /// turns cannot interleave.
    pub session: Mutex<ChatSession>,
    pub backend: Box<dyn ChatBackend>,
    pub model: &'static str,
}

impl AppState {
    pub fn new(session: ChatSession, backend: Box<dyn ChatBackend>, model: &'static str) -> Self {
        Self {
            session: Mutex::new(session),
            backend,
            model,
        }
    }
}
