use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::info;

use crate::provider::ChatBackend;

/// Fixed retry interval for liveness polling. No exponential backoff: the
/// backend is a local, fast-restarting dependency.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll the backend's liveness endpoint until it answers or `timeout`
/// elapses. Returns `true` on the first successful probe. Each attempt
/// carries its own short timeout inside the backend's `ping`.
pub async fn wait_for_server(
    backend: &dyn ChatBackend,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        match backend.ping().await {
            Ok(()) => {
                info!("inference server is alive");
                return true;
            }
            Err(e) => {
                info!(error = %e, "inference server not ready, retrying in {poll_interval:?}");
                sleep(poll_interval).await;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_session::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ping fails until `succeed_on_attempt` (1-based); 0 never succeeds.
    struct FlakyBackend {
        attempts: AtomicUsize,
        succeed_on_attempt: usize,
    }

    impl FlakyBackend {
        fn new(succeed_on_attempt: usize) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                succeed_on_attempt,
            }
        }
    }

    #[async_trait]
    impl ChatBackend for FlakyBackend {
        async fn ping(&self) -> anyhow::Result<()> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on_attempt != 0 && n >= self.succeed_on_attempt {
                Ok(())
            } else {
                anyhow::bail!("connection refused")
            }
        }

        async fn list_models(&self) -> anyhow::Result<Vec<crate::provider::ModelDescriptor>> {
            unreachable!("not used by readiness tests")
        }

        async fn pull_model(
            &self,
            _model: &str,
            _budget: Duration,
        ) -> anyhow::Result<crate::provider::PullStream> {
            unreachable!("not used by readiness tests")
        }

        async fn chat(&self, _model: &str, _history: &[Message]) -> anyhow::Result<String> {
            unreachable!("not used by readiness tests")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_server_exhausts_budget() {
        let backend = FlakyBackend::new(0);
        let timeout = Duration::from_secs(20);
        let interval = Duration::from_secs(5);

        let start = Instant::now();
        let alive = wait_for_server(&backend, timeout, interval).await;
        let elapsed = start.elapsed();

        assert!(!alive);
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_nth_attempt() {
        let backend = FlakyBackend::new(3);
        let interval = Duration::from_secs(5);

        let start = Instant::now();
        let alive = wait_for_server(&backend, Duration::from_secs(60), interval).await;

        assert!(alive);
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
        // two failed attempts means exactly two backoff sleeps
        assert_eq!(start.elapsed(), interval * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_does_not_sleep() {
        let backend = FlakyBackend::new(1);
        let start = Instant::now();
        let alive = wait_for_server(&backend, Duration::from_secs(60), POLL_INTERVAL).await;

        assert!(alive);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
