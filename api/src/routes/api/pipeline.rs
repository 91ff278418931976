use axum::{extract::State, Json};
use engine::{Orchestrator, PipelineStatus};
use serde::Deserialize;
use tracing::info;

use crate::{
    app_state::StatusFeed,
    utils::{client_error, ApiError, MessageBody},
};

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    #[serde(default)]
    pub prompt: String,
}

pub async fn generate(
    State(orchestrator): State<Orchestrator>,
    Json(params): Json<GenerateParams>,
) -> Result<Json<MessageBody>, ApiError> {
    // The run outlives the request; its outcome lands in the status record.
    orchestrator.start(&params.prompt).map_err(client_error)?;

    info!("Pipeline started from API");

    Ok(Json(MessageBody::new("Pipeline started")))
}

pub async fn status(State(StatusFeed(status)): State<StatusFeed>) -> Json<PipelineStatus> {
    Json(status.snapshot())
}
