use async_trait::async_trait;
use chat_session::Message;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::time::Duration;

/// One model descriptor from a listing response. Backend versions disagree
/// on the field name, so both `id` and `name` are accepted; `identifier`
/// tries `id` first.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ModelDescriptor {
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.name.as_deref())
    }
}

/// One decoded line of a streaming pull response. Transient; not persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Lazy sequence of pull progress events. Finite, non-restartable; ends on
/// stream close, yields `Err` on transport failure.
pub type PullStream = BoxStream<'static, anyhow::Result<PullProgress>>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Liveness check: any 2xx from the backend counts as alive. Must use a
    /// short per-request timeout independent of the caller's overall budget.
    async fn ping(&self) -> anyhow::Result<()>;

    /// List available models. Any failure (transport or shape) is an `Err`;
    /// callers decide whether that blocks them.
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>>;

    /// Start a streaming pull of `model`. `budget` bounds the whole request.
    async fn pull_model(&self, model: &str, budget: Duration) -> anyhow::Result<PullStream>;

    /// Non-streaming chat completion over the full accumulated history.
    /// Returns the assistant's reply text.
    async fn chat(&self, model: &str, history: &[Message]) -> anyhow::Result<String>;
}
