//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::events::EventBus;

/// Heartbeat interval for SSE keep-alive comments
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Create an SSE stream forwarding every [`crate::events::GmvEvent`] on the bus
///
/// The stream opens with a `ConnectionStatus: connected` event so the page can
/// show connection state before any domain event arrives. Subscribers that lag
/// behind the bus capacity skip the dropped events and keep going.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     gmv_common::sse::create_event_sse_stream("gmv-ui", &state.events)
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = BroadcastStream::new(bus.subscribe());
    info!(
        "New SSE client connected to {} events ({} subscribers)",
        service_name,
        bus.subscriber_count()
    );

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let name = event.event_type();
                    match Event::default().event(name).json_data(&event) {
                        Ok(sse_event) => {
                            debug!("SSE: forwarding {}", name);
                            yield Ok(sse_event);
                        }
                        Err(e) => warn!("SSE: failed to serialize {}: {}", name, e),
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, skipped {} events", service_name, skipped);
                }
            }
        }

        info!("SSE: {} event stream closed", service_name);
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
