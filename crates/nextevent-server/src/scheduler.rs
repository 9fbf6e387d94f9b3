//! Background scheduler for calendar polling.
//!
//! Polls on a fixed interval and backs off exponentially after consecutive
//! failures. A [`SchedulerHandle`] can request an extra poll, e.g. right after
//! a login. A cycle skipped because no valid token exists yet is not counted
//! as a failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::error::ServerResult;

/// Result of a single successful poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Events were fetched and published.
    Updated,
    /// Nothing was fetched because the credential is not valid.
    Skipped,
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Poll immediately.
    PollNow,
}

/// Scheduler bookkeeping.
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Number of consecutive poll failures.
    pub consecutive_failures: u32,
    /// Cycles skipped for lack of a valid token.
    pub skipped_cycles: u64,
    /// Last successful poll time.
    pub last_success: Option<DateTime<Utc>>,
    /// Last poll attempt time, skipped cycles included.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful poll.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.last_attempt = self.last_success;
        self.last_error = None;
    }

    /// Records a cycle skipped because the credential is not valid.
    pub fn record_skip(&mut self) {
        self.skipped_cycles += 1;
        self.last_attempt = Some(Utc::now());
    }

    /// Records a failed poll.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_attempt = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Creates a new shared scheduler state.
pub fn new_scheduler_state() -> SharedSchedulerState {
    Arc::new(RwLock::new(SchedulerState::new()))
}

/// The scheduler drives periodic calendar polls.
pub struct Scheduler {
    config: PollerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(config: PollerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: new_scheduler_state(),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Runs the scheduler loop until `cancel` fires.
    ///
    /// Polls once immediately, then after every interval (or backoff delay).
    pub async fn run<F, Fut>(self, poll_fn: F, cancel: CancellationToken)
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = ServerResult<PollOutcome>> + Send,
    {
        // The sender stays alive so `recv` only yields commands.
        let Self {
            config,
            state,
            command_tx: _command_tx,
            mut command_rx,
        } = self;

        info!(
            interval_secs = config.interval.as_secs(),
            "calendar poller started"
        );

        do_poll(&state, &poll_fn).await;

        loop {
            let delay = next_delay(&config, &state).await;
            debug!(delay_secs = delay.as_secs(), "scheduling next poll");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("calendar poller cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    do_poll(&state, &poll_fn).await;
                }
                Some(SchedulerCommand::PollNow) = command_rx.recv() => {
                    debug!("received PollNow command");
                    do_poll(&state, &poll_fn).await;
                }
            }
        }
    }
}

async fn next_delay(config: &PollerConfig, state: &SharedSchedulerState) -> Duration {
    let failures = state.read().await.consecutive_failures;
    if failures > 0 {
        let backoff = config.backoff_delay(failures);
        debug!(
            failures,
            backoff_secs = backoff.as_secs(),
            "using backoff delay"
        );
        return backoff;
    }
    config.interval
}

async fn do_poll<F, Fut>(state: &SharedSchedulerState, poll_fn: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ServerResult<PollOutcome>>,
{
    match poll_fn().await {
        Ok(PollOutcome::Updated) => {
            debug!("poll completed");
            state.write().await.record_success();
        }
        Ok(PollOutcome::Skipped) => {
            debug!("not authenticated, poll skipped");
            state.write().await.record_skip();
        }
        Err(e) => {
            warn!(error = %e, "poll failed");
            state.write().await.record_failure(e.to_string());
        }
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Triggers an immediate poll.
    pub async fn poll_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::PollNow).await
    }
}
