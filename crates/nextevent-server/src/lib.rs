//! Daemon: calendar polling, status file, next-event endpoint.
//!
//! This crate provides the parts of the nextevent daemon that consume the
//! access token:
//! - Background scheduling of calendar polls
//! - The Microsoft Graph `calendarview` client
//! - The plain-text status file
//! - The `/next-event` HTTP endpoint
//! - Signal handling for graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nextevent_auth::AccessTokenSource;
//! use nextevent_server::{CalendarPoller, PollerConfig, Scheduler, new_shared_state};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn poll(tokens: Arc<dyn AccessTokenSource>) -> nextevent_server::ServerResult<()> {
//!     let config = PollerConfig::default();
//!     let poller = CalendarPoller::new(tokens, &config, new_shared_state())?;
//!     Scheduler::new(config)
//!         .run(|| poller.poll_once(), CancellationToken::new())
//!         .await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod graph;
mod handler;
mod poller;
mod scheduler;
mod signals;
mod status;

#[cfg(test)]
mod testing;

pub use config::PollerConfig;
pub use error::{ServerError, ServerResult};
pub use graph::GraphCalendarClient;
pub use handler::{ServerState, SharedState, new_shared_state, next_event_router};
pub use poller::CalendarPoller;
pub use scheduler::{
    PollOutcome, Scheduler, SchedulerCommand, SchedulerHandle, SchedulerState,
    SharedSchedulerState, new_scheduler_state,
};
pub use signals::SignalHandler;
pub use status::StatusFile;
