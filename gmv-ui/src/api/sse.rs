//! Server-Sent Events for live view updates
//!
//! The page re-requests its map when `GeocodeCacheUpdated` arrives and
//! refreshes the admin table on `GeocodeFixApplied`.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    gmv_common::sse::create_event_sse_stream("gmv-ui", &state.events)
}
