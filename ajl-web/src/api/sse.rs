//! Server-Sent Events for live workshop updates

use ajl_common::sse::workshop_event_stream;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tracing::debug;

use crate::AppState;

/// GET /api/events
///
/// A new connection means a page just became visible, so the phase is
/// re-read right away instead of waiting for the next poll.
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    if state.phase_refresh.try_send(()).is_err() {
        debug!("Phase refresh already pending");
    }
    workshop_event_stream(&state.event_bus, state.phase_store.current())
}

pub fn sse_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(event_stream))
}
