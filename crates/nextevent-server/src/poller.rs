//! One calendar poll: read the token, fetch, publish.

use std::sync::Arc;

use chrono::Utc;
use nextevent_auth::AccessTokenSource;
use nextevent_core::TimeWindow;
use tracing::{debug, warn};

use crate::config::PollerConfig;
use crate::error::{ServerError, ServerResult};
use crate::graph::GraphCalendarClient;
use crate::handler::SharedState;
use crate::scheduler::PollOutcome;
use crate::status::StatusFile;

/// Fetches the calendar with the current access token and publishes the
/// result to the shared state and the status file.
pub struct CalendarPoller {
    tokens: Arc<dyn AccessTokenSource>,
    client: GraphCalendarClient,
    state: SharedState,
    status_file: StatusFile,
    lookahead: chrono::Duration,
}

impl CalendarPoller {
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        config: &PollerConfig,
        state: SharedState,
    ) -> ServerResult<Self> {
        let client = GraphCalendarClient::new(&config.graph_base_url, config.request_timeout)?;
        let lookahead = chrono::Duration::from_std(config.lookahead)
            .map_err(|_| ServerError::config("lookahead is out of range"))?;

        Ok(Self {
            tokens,
            client,
            state,
            status_file: StatusFile::new(config.status_file.clone()),
            lookahead,
        })
    }

    /// Runs one poll cycle.
    ///
    /// Returns [`PollOutcome::Skipped`] without any request when the token is
    /// not valid.
    pub async fn poll_once(&self) -> ServerResult<PollOutcome> {
        let (token, authenticated) = self.tokens.access_token();
        if !authenticated {
            return Ok(PollOutcome::Skipped);
        }

        let now = Utc::now();
        let window = TimeWindow::from_now(now, self.lookahead);
        let events = self.client.calendar_view(&token, &window).await?;
        debug!(count = events.len(), "calendar events fetched");

        let text = {
            let mut state = self.state.write().await;
            state.set_events(events, now);
            state.next_event_text().to_string()
        };

        if let Err(e) = self.status_file.write(&text) {
            warn!(error = %e, "failed to write status file");
        }
        Ok(PollOutcome::Updated)
    }
}
