//! Server-sent event stream of live samples

use axum::{
    extract::State,
    http::{HeaderName, header},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::{debug, warn};

use super::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// SSE endpoint for live telemetry.
///
/// Starts the hub if nothing has yet, then forwards every sample published
/// after the client connected as one `data:` event. There is no replay and
/// no keep-alive traffic. Disconnecting drops the subscription.
pub async fn telemetry_stream(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.hub.start(&state.config.udp_host, state.config.udp_port).await {
        warn!("Telemetry hub unavailable, stream will stay silent: {}", e);
    }

    let samples = state.hub.subscribe();
    debug!(subscribers = state.hub.subscriber_count(), "SSE client connected");

    let events = samples.filter_map(|sample| async move {
        match Event::default().json_data(&sample) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!(topic = %sample.topic, "Failed to serialize sample: {}", e);
                None
            }
        }
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(events),
    )
}
