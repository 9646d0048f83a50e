use crate::{Message, Role};

/// An ordered conversation history with a fixed seed.
///
/// The seed (typically a single system prompt, possibly empty) is what the
/// session starts from and what `reset` restores. Callers drive the turn
/// protocol with `checkpoint`/`rollback_to`: take a checkpoint before
/// appending the user message, roll back to it if the backend call fails,
/// so the history never ends in an unanswered user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSession {
    seed: Vec<Message>,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Empty session: no seed, no messages.
    pub fn new() -> Self {
        Self::with_seed(Vec::new())
    }

    /// Session starting from (and resetting to) `seed`.
    pub fn with_seed(seed: Vec<Message>) -> Self {
        Self {
            messages: seed.clone(),
            seed,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::Assistant, content));
    }

    /// Marker for the current end of history, to pass to `rollback_to`.
    pub fn checkpoint(&self) -> usize {
        self.messages.len()
    }

    /// Discard every message appended after `checkpoint`.
    pub fn rollback_to(&mut self, checkpoint: usize) {
        self.messages.truncate(checkpoint);
    }

    /// Replace the history wholesale with the seed. Unconditional.
    pub fn reset(&mut self) {
        self.messages = self.seed.clone();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
