//! Microsoft Graph calendar client.

use std::time::Duration;

use nextevent_core::{CalendarEvent, EventList, TimeWindow};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ServerError, ServerResult};

/// Fields requested for every event.
const SELECT_FIELDS: &str = "subject,start,end,location";

/// Upper bound on `@odata.nextLink` pages followed per request.
const MAX_PAGES: usize = 20;

/// Reads the signed-in user's calendar view.
#[derive(Debug, Clone)]
pub struct GraphCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GraphCalendarClient {
    /// Creates a client for the Graph root at `base_url` (e.g. `https://graph.microsoft.com/v1.0`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Builds the first-page URL of the calendar view for `window`.
    pub fn calendar_view_url(&self, window: &TimeWindow) -> ServerResult<Url> {
        let endpoint = format!("{}/me/calendarview", self.base_url);
        Url::parse_with_params(
            &endpoint,
            &[
                ("startdatetime", window.graph_start()),
                ("enddatetime", window.graph_end()),
                ("$select", SELECT_FIELDS.to_string()),
                ("$orderby", "start/dateTime".to_string()),
            ],
        )
        .map_err(|e| ServerError::config(format!("invalid Graph URL {}: {}", endpoint, e)))
    }

    /// Fetches all events overlapping `window`, following pagination.
    ///
    /// A 401 maps to [`ServerError::Unauthenticated`] so callers can tell an
    /// expired token apart from an API failure.
    pub async fn calendar_view(
        &self,
        access_token: &str,
        window: &TimeWindow,
    ) -> ServerResult<Vec<CalendarEvent>> {
        let mut url = self.calendar_view_url(window)?;
        let mut events = Vec::new();

        for page in 0..MAX_PAGES {
            let list = self.fetch_page(access_token, url).await?;
            events.extend(list.value);

            match list.next_link {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| {
                        ServerError::calendar(format!("invalid nextLink {}: {}", next, e))
                    })?;
                }
                None => {
                    debug!(count = events.len(), pages = page + 1, "fetched calendar view");
                    return Ok(events);
                }
            }
        }

        warn!(max_pages = MAX_PAGES, "calendar view truncated");
        Ok(events)
    }

    async fn fetch_page(&self, access_token: &str, url: Url) -> ServerResult<EventList> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServerError::calendar("calendar request timed out")
                } else {
                    ServerError::calendar(format!("calendar request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServerError::Unauthenticated);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ServerError::calendar(format!("failed to read calendar response: {}", e)))?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(200).collect();
            return Err(ServerError::calendar_status(
                status.as_u16(),
                format!("calendar API returned {}: {}", status, excerpt),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| ServerError::calendar(format!("invalid calendar response: {}", e)))
    }
}
