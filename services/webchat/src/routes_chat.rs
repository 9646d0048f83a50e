use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::state::SharedState;
use crate::turn::{send_turn, TurnError};

#[derive(Deserialize)]
pub struct ChatReq {
    pub message: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat_send))
        .route("/reset", post(chat_reset))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn chat_send(
    State(state): State<SharedState>,
    Json(req): Json<ChatReq>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    // lock held across the whole turn, including the backend call
    let mut session = state.session.lock().await;

    match send_turn(&mut session, state.backend.as_ref(), state.model, &req.message).await {
        Ok(reply) => Ok(Json(json!({ "response": reply }))),
        Err(TurnError::EmptyMessage) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Empty message" })),
        )),
        Err(e) => {
            error!(error = %e, "error during chat");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Internal Server Error: {e}") })),
            ))
        }
    }
}

async fn chat_reset(State(state): State<SharedState>) -> Json<serde_json::Value> {
    state.session.lock().await.reset();
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatBackend, ModelDescriptor, PullStream};
    use crate::state::AppState;
    use async_trait::async_trait;
    use chat_session::{ChatSession, Message};
    use std::sync::Arc;
    use std::time::Duration;

    struct ReplyBackend {
        reply: anyhow::Result<&'static str>,
    }

    #[async_trait]
    impl ChatBackend for ReplyBackend {
        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
            unreachable!("not used by route tests")
        }

        async fn pull_model(&self, _model: &str, _budget: Duration) -> anyhow::Result<PullStream> {
            unreachable!("not used by route tests")
        }

        async fn chat(&self, _model: &str, _history: &[Message]) -> anyhow::Result<String> {
            match &self.reply {
                Ok(reply) => Ok(reply.to_string()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    /// Serve the router on an ephemeral port; returns the base URL and the
    /// state handle for inspecting the session afterwards.
    async fn serve(backend: ReplyBackend) -> (String, SharedState) {
        let seed = vec![Message::system("You are a helpful assistant.")];
        let state = Arc::new(AppState::new(
            ChatSession::with_seed(seed),
            Box::new(backend),
            "qwen3:4b",
        ));

        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn test_chat_end_to_end() {
        let (base, state) = serve(ReplyBackend { reply: Ok("Hello!") }).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/chat"))
            .json(&json!({ "message": "Hi" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "response": "Hello!" }));

        let session = state.session.lock().await;
        assert_eq!(
            session.messages(),
            &[
                Message::system("You are a helpful assistant."),
                Message::user("Hi"),
                Message::assistant("Hello!"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let (base, state) = serve(ReplyBackend { reply: Ok("unused") }).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/chat"))
            .json(&json!({ "message": "" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Empty message" }));
        assert_eq!(state.session.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_internal_error_and_rolls_back() {
        let (base, state) = serve(ReplyBackend {
            reply: Err(anyhow::anyhow!("connection refused")),
        })
        .await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/chat"))
            .json(&json!({ "message": "Hi" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = resp.json().await.unwrap();
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Internal Server Error: "));
        assert!(error.contains("connection refused"));

        // no dangling user message
        assert_eq!(state.session.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_restores_seed() {
        let (base, state) = serve(ReplyBackend { reply: Ok("Hello!") }).await;
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/chat"))
            .json(&json!({ "message": "Hi" }))
            .send()
            .await
            .unwrap();

        let resp = client.post(format!("{base}/reset")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "status": "ok" }));

        let session = state.session.lock().await;
        assert_eq!(
            session.messages(),
            &[Message::system("You are a helpful assistant.")]
        );
    }

    #[tokio::test]
    async fn test_index_serves_chat_page() {
        let (base, _state) = serve(ReplyBackend { reply: Ok("unused") }).await;
        let resp = reqwest::get(&base).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let page = resp.text().await.unwrap();
        assert!(page.contains("<html"));
    }
}
