//! Background renewal of the access token.
//!
//! A [`RefreshSupervisor`] run goes `Idle → Running → Stopped`. While running
//! it repeats one cycle:
//!
//! 1. persist the current credential in the background (when enabled)
//! 2. sleep until `expires_in - safety_margin`
//! 3. exchange the refresh token
//!
//! Any failed attempt clears the credential store. Network failures are
//! retried with exponential backoff up to [`SupervisorConfig::network_retries`]
//! times using the refresh token held before the first attempt; every other
//! failure stops the run. A login committed while a retry is pending replaces
//! that retry: the cycle ends and the next one works from the new credential.
//! A stopped supervisor never logs in again on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AuthErrorCode;
use crate::manager::{CredentialManager, RefreshAttempt};

/// Timing and retry settings of the refresh loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Refresh this long before the access token expires.
    pub safety_margin: Duration,
    /// Extra attempts after a network failure. Zero stops on the first failure.
    pub network_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(60),
            network_retries: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl SupervisorConfig {
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_retries(mut self, retries: u32, initial: Duration, max: Duration) -> Self {
        self.network_retries = retries;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before retry number `retry` (zero based): `initial * 2^retry`,
    /// capped at `max_backoff`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Time to wait before refreshing a token valid for `expires_in` seconds.
///
/// Never negative: a lifetime shorter than the margin refreshes immediately.
pub fn sleep_duration(expires_in: u64, safety_margin: Duration) -> Duration {
    Duration::from_secs(expires_in).saturating_sub(safety_margin)
}

/// Why a supervisor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A refresh failed and the store was cleared.
    RefreshFailed(AuthErrorCode),
    /// The run was cancelled through [`RefreshSupervisor::cancel`].
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Stopped(StopReason),
}

impl SupervisorState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Owns the refresh task and publishes its state.
///
/// The state channel outlives individual runs, so subscribers keep observing
/// transitions when a stopped supervisor is started again.
#[derive(Debug)]
pub struct RefreshSupervisor {
    config: SupervisorConfig,
    state: Arc<watch::Sender<SupervisorState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefreshSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            config,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Spawns the refresh loop.
    ///
    /// Returns false without doing anything while a run is active. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self, manager: Arc<CredentialManager>) -> bool {
        if self.state().is_running() {
            debug!("refresh supervisor already running");
            return false;
        }

        self.cancel = CancellationToken::new();
        self.state.send_replace(SupervisorState::Running);
        info!(
            safety_margin_secs = self.config.safety_margin.as_secs(),
            network_retries = self.config.network_retries,
            "refresh supervisor started"
        );

        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            let reason = run(&manager, &config, &cancel).await;
            match reason {
                StopReason::Cancelled => info!("refresh supervisor cancelled"),
                StopReason::RefreshFailed(code) => {
                    error!(code = %code, "refresh supervisor stopped, interactive login required")
                }
            }
            state.send_replace(SupervisorState::Stopped(reason));
        }));
        true
    }

    /// Signals the current run to stop and hands back its task to await.
    pub fn cancel(&mut self) -> Option<JoinHandle<()>> {
        self.cancel.cancel();
        self.task.take()
    }
}

async fn run(
    manager: &CredentialManager,
    config: &SupervisorConfig,
    cancel: &CancellationToken,
) -> StopReason {
    loop {
        manager.persist_in_background();

        let delay = sleep_duration(manager.store().expires_in(), config.safety_margin);
        debug!(delay_secs = delay.as_secs(), "next token refresh scheduled");

        tokio::select! {
            _ = cancel.cancelled() => return StopReason::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        if let Err(reason) = refresh_with_retries(manager, config, cancel).await {
            return reason;
        }
    }
}

async fn refresh_with_retries(
    manager: &CredentialManager,
    config: &SupervisorConfig,
    cancel: &CancellationToken,
) -> Result<(), StopReason> {
    let Some((refresh_token, mut generation)) = manager.store().refresh_ticket() else {
        let code = match manager.refresh().await {
            Ok(()) => return Ok(()),
            Err(e) => e.code(),
        };
        return Err(StopReason::RefreshFailed(code));
    };

    let mut retry = 0;
    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return Err(StopReason::Cancelled),
            attempt = manager.refresh_with(&refresh_token, generation) => attempt,
        };

        let error = match attempt {
            RefreshAttempt::Committed => return Ok(()),
            RefreshAttempt::Superseded => {
                info!("credential replaced by a new login, refresh cycle restarted");
                return Ok(());
            }
            RefreshAttempt::Failed { error, generation: cleared } => {
                // Retries stay valid only while nothing replaces the cleared store.
                generation = cleared;
                error
            }
        };

        if !error.is_transient() || retry >= config.network_retries {
            return Err(StopReason::RefreshFailed(error.code()));
        }

        let delay = config.backoff_delay(retry);
        retry += 1;
        warn!(
            error = %error,
            retry,
            max_retries = config.network_retries,
            backoff_secs = delay.as_secs(),
            "token refresh failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(StopReason::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
