//! Query windows for calendar polling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout accepted by Graph `calendarview` query parameters.
const GRAPH_QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window; the bounds are swapped if given in reverse order.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Window starting at `now` and extending `lookahead` into the future.
    pub fn from_now(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self::new(now, now + lookahead)
    }

    /// Start bound formatted for a Graph query string.
    pub fn graph_start(&self) -> String {
        self.start.format(GRAPH_QUERY_FORMAT).to_string()
    }

    /// End bound formatted for a Graph query string.
    pub fn graph_end(&self) -> String {
        self.end.format(GRAPH_QUERY_FORMAT).to_string()
    }
}
