//! Core types: calendar events, next-event selection, tracing setup

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{
    CalendarEvent, EventList, EventLocation, GraphDateTime, NO_EVENTS_TEXT, next_event,
    render_next_event,
};
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
