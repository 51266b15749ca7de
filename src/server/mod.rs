//! HTTP surface: live sample stream, ULog upload and health
//!
//! | Route                       | Method | Handler                       |
//! |-----------------------------|--------|-------------------------------|
//! | `/api/telemetry/stream`     | GET    | [`stream::telemetry_stream`]  |
//! | `/api/parse-ulog`           | POST   | [`upload::parse_ulog`]        |
//! | `/health`                   | GET    | [`health::health_check`]      |

pub mod health;
pub mod stream;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::TelemetryHub;
use crate::config::ServerConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<TelemetryHub>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(hub: Arc<TelemetryHub>, config: ServerConfig) -> Self {
        Self { hub, config: Arc::new(config) }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let upload_routes = Router::new()
        .route("/api/parse-ulog", post(upload::parse_ulog))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size));

    let app = Router::new()
        .route("/api/telemetry/stream", get(stream::telemetry_stream))
        .route("/health", get(health::health_check))
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http());

    let app = match cors_layer(&state.config.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    info!("CORS origins: {:?}", origins);

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
    )
}
