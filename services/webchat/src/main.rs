mod config;
mod provider;
mod provider_ollama;
mod provision;
mod readiness;
mod routes_chat;
mod state;
mod turn;

use anyhow::{bail, Result};
use chat_session::{ChatSession, Message};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::provider_ollama::OllamaBackend;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    let backend = OllamaBackend::new(cfg.ollama_host.clone());

    // --- Startup provisioning (fail fast) ---
    // The backend must be reachable and the model present before any
    // traffic is accepted; there is no "serve without a model" mode.
    let provisioned = provision::provision(&backend, config::MODEL_NAME, cfg.startup_timeout).await;
    if !provisioned.is_ready() {
        bail!(
            "failed to provision model '{}': {provisioned:?}",
            config::MODEL_NAME
        );
    }
    info!(model = config::MODEL_NAME, state = ?provisioned, "backend ready");

    let seed = vec![Message::system(config::SYSTEM_PROMPT)];
    let app_state = Arc::new(AppState::new(
        ChatSession::with_seed(seed),
        Box::new(backend),
        config::MODEL_NAME,
    ));

    let app = routes_chat::router(app_state);

    let addr = &cfg.bind_addr;
    println!("webchat listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
