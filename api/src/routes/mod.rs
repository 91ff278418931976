use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;

pub mod api;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(api::pipeline::status))
        .route("/api/generate", post(api::pipeline::generate))
        .route("/api/check-dependencies", get(api::dependencies::check))
        .route("/api/viewer", get(api::viewer::open))
        .route("/api/start-viewer", post(api::viewer::start))
        .route("/api/events", get(api::events::ws_events))
        .route("/api/events/stream", get(api::events::sse_events))
        .with_state(state)
}
