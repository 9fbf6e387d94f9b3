//! Shared poller state and the `/next-event` endpoint.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use chrono::{DateTime, Local, Utc};
use tokio::sync::RwLock;

use nextevent_core::{CalendarEvent, NO_EVENTS_TEXT, next_event, render_next_event};

/// What the poller last learned about the calendar.
#[derive(Debug)]
pub struct ServerState {
    last_update: Option<DateTime<Utc>>,
    events: Vec<CalendarEvent>,
    next_event_text: String,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            last_update: None,
            events: Vec::new(),
            next_event_text: NO_EVENTS_TEXT.to_string(),
        }
    }

    /// Replaces the cached events and re-renders the next event in local time.
    pub fn set_events(&mut self, events: Vec<CalendarEvent>, now: DateTime<Utc>) {
        self.next_event_text = render_next_event(next_event(&events, now), &Local);
        self.events = events;
        self.last_update = Some(now);
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn next_event_text(&self) -> &str {
        &self.next_event_text
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}

/// Shared server state type.
pub type SharedState = Arc<RwLock<ServerState>>;

/// Creates a new shared server state.
pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(ServerState::new()))
}

/// `GET /next-event`, merged into the login router by the binary.
pub fn next_event_router(state: SharedState) -> Router {
    Router::new()
        .route("/next-event", get(next_event_text))
        .with_state(state)
}

async fn next_event_text(State(state): State<SharedState>) -> String {
    state.read().await.next_event_text().to_string()
}
