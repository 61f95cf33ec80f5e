//! Console SSE stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};

use huddle_core::{defaults, BusEvent};

use crate::state::AppState;

/// SSE broadcast of every bus event, consumed by the web console.
///
/// Wire format per event: `data: {"type":"…","payload":{…}}`. A subscriber
/// that lags past the bus capacity misses events and is expected to
/// reconcile by re-reading state; `Lagged` is therefore skipped, not fatal.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.events().subscribe();

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(
        |result: Result<BusEvent, _>| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(_) => None,
            },
            Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                tracing::debug!(missed = n, "SSE subscriber lagged; oldest events dropped");
                None
            }
        },
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}
