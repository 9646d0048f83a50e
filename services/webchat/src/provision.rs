use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::provider::ChatBackend;
use crate::readiness::{wait_for_server, POLL_INTERVAL};

/// Where startup provisioning ended up. Computed once before the server
/// accepts traffic and never re-checked on the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    Unknown,
    ServerUnreachable,
    ServerAlive,
    ModelPresent,
    ModelPulling,
    ModelVerified,
    ModelMissing,
}

impl ProvisioningState {
    /// True for the two terminal-success states.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::ModelPresent | Self::ModelVerified)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("model pull failed: {0}")]
    PullFailed(String),
    #[error("model verification failed: {0}")]
    VerifyFailed(String),
    #[error("model '{0}' still absent after pull")]
    ModelAbsentAfterPull(String),
}

/// Drive the whole startup machine: wait for the server, then make sure
/// `model` is available, pulling it if necessary. Anything other than a
/// ready state is fatal to startup; the caller decides to exit.
pub async fn provision(
    backend: &dyn ChatBackend,
    model: &str,
    timeout: Duration,
) -> ProvisioningState {
    let start = Instant::now();
    let mut state = ProvisioningState::Unknown;

    info!(?state, "connecting to inference server");
    if !wait_for_server(backend, timeout, POLL_INTERVAL).await {
        error!("inference server connection timed out");
        return ProvisioningState::ServerUnreachable;
    }
    state = ProvisioningState::ServerAlive;
    info!(?state, "liveness check passed");

    // the pull gets whatever is left of the startup budget
    let remaining = timeout.saturating_sub(start.elapsed());
    match ensure_model(backend, model, remaining).await {
        Ok(state) => state,
        Err(e) => {
            error!(model, error = %e, "model provisioning failed");
            ProvisioningState::ModelMissing
        }
    }
}

/// List -> Check -> Pull -> Verify. A failed or malformed listing never
/// blocks provisioning: absence of proof of existence is treated as
/// absence, and the pull decides.
pub async fn ensure_model(
    backend: &dyn ChatBackend,
    model: &str,
    budget: Duration,
) -> Result<ProvisioningState, ProvisionError> {
    if model_listed(backend, model).await {
        info!(model, "model already available");
        return Ok(ProvisioningState::ModelPresent);
    }

    info!(model, state = ?ProvisioningState::ModelPulling, "model not found, pulling");
    let mut events = backend
        .pull_model(model, budget)
        .await
        .map_err(|e| ProvisionError::PullFailed(e.to_string()))?;

    let mut last_status: Option<String> = None;
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ProvisionError::PullFailed(e.to_string()))?;
        if let Some(err) = event.error {
            return Err(ProvisionError::PullFailed(err));
        }
        if let Some(status) = event.status {
            // repeated statuses are only coalesced for the log
            if last_status.as_deref() != Some(status.as_str()) {
                info!(%status, "pull progress");
                last_status = Some(status);
            }
        }
    }

    info!(model, "pull stream finished, verifying");
    let verified = backend
        .list_models()
        .await
        .map_err(|e| ProvisionError::VerifyFailed(e.to_string()))?
        .iter()
        .any(|m| m.identifier() == Some(model));

    if verified {
        Ok(ProvisioningState::ModelVerified)
    } else {
        Err(ProvisionError::ModelAbsentAfterPull(model.to_string()))
    }
}

async fn model_listed(backend: &dyn ChatBackend, model: &str) -> bool {
    match backend.list_models().await {
        Ok(models) => models.iter().any(|m| m.identifier() == Some(model)),
        Err(e) => {
            warn!(error = %e, "model listing failed, assuming model is absent");
            false
        }
    }
}
