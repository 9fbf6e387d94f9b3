//! Calendar event types as returned by the Microsoft Graph `calendarview` API.
//!
//! - [`CalendarEvent`]: a single event with its location and start/end times
//! - [`EventList`]: the response envelope
//! - [`next_event`]: picks the soonest event that has not finished yet
//! - [`render_next_event`]: the one-line text shown by the status file and
//!   the `/next-event` endpoint

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Text rendered when there is no upcoming event.
pub const NO_EVENTS_TEXT: &str = "No events";

/// Graph serializes wall-clock times with up to seven fractional digits.
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Where an event takes place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLocation {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "locationType")]
    pub location_type: String,
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    #[serde(rename = "uniqueIdType")]
    pub unique_id_type: String,
}

/// A wall-clock time plus the time zone it is expressed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

impl GraphDateTime {
    pub fn new(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: date_time.into(),
            time_zone: time_zone.into(),
        }
    }

    /// Parses the wall-clock value as UTC.
    ///
    /// Graph returns UTC unless the request carries a `Prefer: outlook.timezone`
    /// header, which the poller never sends.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(self.date_time.trim(), GRAPH_DATETIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// A single calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEvent {
    pub id: String,
    pub subject: String,
    pub location: EventLocation,
    pub start: GraphDateTime,
    pub end: GraphDateTime,
}

impl CalendarEvent {
    /// Returns true once the event is over at `now`.
    ///
    /// Without a parseable end time the event counts as finished once it has
    /// started.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        match (self.end.to_utc(), self.start.to_utc()) {
            (Some(end), _) => end <= now,
            (None, Some(start)) => start < now,
            (None, None) => true,
        }
    }
}

/// Response envelope of `GET /me/calendarview`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventList {
    #[serde(rename = "@odata.context")]
    pub context: String,
    /// Absolute URL of the next page, when the view spans several pages.
    #[serde(rename = "@odata.nextLink", skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
    pub value: Vec<CalendarEvent>,
}

/// Returns the event with the earliest start among those not yet finished.
///
/// Events whose start cannot be parsed are ignored. Ties keep the order the
/// server returned.
pub fn next_event(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<&CalendarEvent> {
    events
        .iter()
        .filter(|event| !event.has_ended(now))
        .filter_map(|event| event.start.to_utc().map(|start| (start, event)))
        .min_by_key(|(start, _)| *start)
        .map(|(_, event)| event)
}

/// Renders `"{subject} - {HH:MM}"` with the start shown in `tz`.
pub fn render_next_event<Tz>(event: Option<&CalendarEvent>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(event) = event else {
        return NO_EVENTS_TEXT.to_string();
    };

    match event.start.to_utc() {
        Some(start) => format!(
            "{} - {}",
            event.subject,
            start.with_timezone(tz).format("%H:%M")
        ),
        None => event.subject.clone(),
    }
}
