//! Unix signal handling for graceful shutdown.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) cancel a shared
//! [`CancellationToken`]; every long-running task of the daemon selects on a
//! child of that token.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Turns process signals into cancellation.
#[derive(Debug, Clone, Default)]
pub struct SignalHandler {
    shutdown: CancellationToken,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the signal listener task.
    ///
    /// Should be called once at startup.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!(error = %e, "failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                _ = sigint.recv() => info!("received SIGINT, initiating shutdown"),
                _ = shutdown.cancelled() => {}
            }
            shutdown.cancel();
            debug!("signal listener stopped");
        });
    }

    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("received Ctrl+C, initiating shutdown");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
            shutdown.cancel();
        });
    }

    /// Token cancelled on shutdown; hand children of it to tasks.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns true if shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Programmatically triggers a shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Completes once shutdown is signaled.
    pub async fn wait(&self) {
        self.shutdown.cancelled().await;
    }
}
