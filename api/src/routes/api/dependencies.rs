use std::sync::Arc;

use axum::{extract::State, Json};
use engine::{prerequisites, Config, DependencyReport};

pub async fn check(State(config): State<Arc<Config>>) -> Json<DependencyReport> {
    Json(prerequisites::check(&config))
}
