use anyhow::{bail, Result};
use std::time::Duration;

/// The model this deployment serves. Fixed at build time; provisioning at
/// startup makes sure the backend actually has it.
pub const MODEL_NAME: &str = "qwen3:4b";

/// System prompt the conversation is seeded with, and what `/reset`
/// restores.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ollama_host: String,
    pub bind_addr: String,
    pub startup_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // inside a compose network this is e.g. http://ollama_server:11434
        let ollama_host = std::env::var("OLLAMA_HOST")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        let bind_addr = std::env::var("WEBCHAT_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5001".to_string());

        // generous default: first startup may download the whole model
        let startup_timeout_secs = match std::env::var("STARTUP_TIMEOUT_SECS") {
            Ok(v) => match v.parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => bail!("STARTUP_TIMEOUT_SECS must be an integer number of seconds"),
            },
            Err(_) => 600,
        };

        // Tiny sanity checks (fail fast, fail loud)
        if !ollama_host.starts_with("http://") && !ollama_host.starts_with("https://") {
            bail!("OLLAMA_HOST must start with http:// or https://");
        }

        Ok(Self {
            ollama_host,
            bind_addr,
            startup_timeout: Duration::from_secs(startup_timeout_secs),
        })
    }
}
