use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use super::AppState;
use crate::hub::{HubState, StatsSnapshot};

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub hub: HubState,
    pub subscribers: usize,
    pub stats: StatsSnapshot,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let hub = state.hub.state();
    let status = match hub {
        HubState::Listening { .. } => "healthy",
        HubState::NotStarted => "idle",
        HubState::Failed { .. } => "degraded",
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        hub,
        subscribers: state.hub.subscriber_count(),
        stats: state.hub.stats(),
    };

    (StatusCode::OK, Json(response))
}
