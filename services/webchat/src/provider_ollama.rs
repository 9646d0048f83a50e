use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chat_session::Message;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::time::Duration;

use crate::provider::{ChatBackend, ModelDescriptor, PullProgress, PullStream};

/// Per-attempt liveness timeout; deliberately short and independent of the
/// overall readiness budget.
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Ollama backend: OpenAI-compatible `/v1` endpoints for listing and chat,
/// native `/api/pull` for streaming model pulls.
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelDescriptor>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn ping(&self) -> anyhow::Result<()> {
        self.client
            .get(&self.base_url)
            .timeout(LIVENESS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
        let url = format!("{}/v1/models", self.base_url);
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let list: ModelList = resp.json().await.context("unexpected model list shape")?;
        Ok(list.data)
    }

    async fn pull_model(&self, model: &str, budget: Duration) -> anyhow::Result<PullStream> {
        let url = format!("{}/api/pull", self.base_url);
        let body = serde_json::json!({ "name": model, "stream": true });

        let resp = self
            .client
            .post(url)
            .json(&body)
            .timeout(budget)
            .send()
            .await?
            .error_for_status()?;

        let bytes = resp.bytes_stream().map_err(anyhow::Error::from).boxed();
        Ok(decode_pull_lines(bytes))
    }

    async fn chat(&self, model: &str, history: &[Message]) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": history,
            "stream": false,
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self.client.post(url).json(&body).send().await?.error_for_status()?;
        let completion: ChatCompletion =
            resp.json().await.context("unexpected chat completion shape")?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .context("chat completion contained no choices")?;
        Ok(choice.message.content)
    }
}

/// Decode a newline-delimited JSON byte stream into pull progress events,
/// one complete line at a time. Undecodable lines are skipped; a trailing
/// unterminated line is flushed when the stream closes.
fn decode_pull_lines(bytes: BoxStream<'static, anyhow::Result<Bytes>>) -> PullStream {
    let decoder = LineDecoder {
        inner: bytes,
        buf: Vec::new(),
        done: false,
    };
    futures::stream::unfold(decoder, |mut dec| async move {
        dec.next_event().await.map(|ev| (ev, dec))
    })
    .boxed()
}

struct LineDecoder {
    inner: BoxStream<'static, anyhow::Result<Bytes>>,
    buf: Vec<u8>,
    done: bool,
}

impl LineDecoder {
    async fn next_event(&mut self) -> Option<anyhow::Result<PullProgress>> {
        loop {
            if let Some(ev) = self.take_line() {
                return Some(Ok(ev));
            }
            if self.done {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    // terminate the trailing partial line, if any
                    self.done = true;
                    self.buf.push(b'\n');
                }
            }
        }
    }

    /// Pop the next complete, well-formed line from the buffer.
    fn take_line(&mut self) -> Option<PullProgress> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            match serde_json::from_slice::<PullProgress>(line) {
                Ok(ev) => return Some(ev),
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        line = %String::from_utf8_lossy(line),
                        "skipping undecodable pull line"
                    );
                }
            }
        }
        None
    }
}
