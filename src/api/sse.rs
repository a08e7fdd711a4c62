//! Server-Sent Events support

use crate::normalizer::WireEvent;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// Convert a run's wire events to an SSE response.
///
/// Each event is one unnamed `data: <json>` frame. No keep-alive comments
/// are sent, so the body holds exactly the wire events.
pub fn sse_stream<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = WireEvent> + Send + 'static,
{
    Sse::new(events.filter_map(|event| wire_event_to_axum(&event).map(Ok)))
}

fn wire_event_to_axum(event: &WireEvent) -> Option<Event> {
    match event.to_json() {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            tracing::error!(?event, error = %e, "Failed to serialize wire event, dropping it");
            None
        }
    }
}
