use axum::{extract::State, Json};
use engine::{viewer::open_in_browser, Orchestrator, StartError, ViewerError};
use tracing::{info, warn};

use crate::{
    app_state::StatusFeed,
    utils::{client_error, internal_error, ApiError, MessageBody},
};

/// Opens the last published viewer in the desktop browser.
pub async fn open(
    State(StatusFeed(status)): State<StatusFeed>,
) -> Result<Json<MessageBody>, ApiError> {
    let url = status
        .snapshot()
        .viewer_url
        .ok_or_else(|| client_error(ViewerError::NotPublished))?;

    let result = open_in_browser(&url).await;

    if !result.ok {
        warn!("Could not open browser: {}", result.diagnostic());
    }

    Ok(Json(MessageBody::with_url("Opening viewer", url)))
}

/// Publishes the viewer without running the rest of the pipeline.
pub async fn start(
    State(orchestrator): State<Orchestrator>,
) -> Result<Json<MessageBody>, ApiError> {
    if orchestrator.status().snapshot().is_running {
        return Err(client_error(StartError::AlreadyRunning));
    }

    let url = orchestrator
        .toolchain()
        .publish()
        .await
        .map_err(internal_error)?;

    info!("Web viewer started at {url}");

    // A run may have started while the viewer was launching; it owns the URL then.
    orchestrator
        .status()
        .record_viewer_url_if_idle(url.clone())
        .map_err(client_error)?;

    Ok(Json(MessageBody::with_url("Web viewer started", url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::state_in;
    use async_trait::async_trait;
    use axum::extract::FromRef;
    use engine::{StatusRecord, StepResult, Toolchain};
    use hyper::StatusCode;
    use std::sync::Arc;

    /// A pipeline run claims the record while the viewer is launching.
    struct RunStartsDuringPublish(Arc<StatusRecord>);

    #[async_trait]
    impl Toolchain for RunStartsDuringPublish {
        async fn generate(&self, _prompt: &str) -> StepResult {
            std::future::pending().await
        }

        async fn export(&self) -> StepResult {
            StepResult::success()
        }

        async fn publish(&self) -> Result<String, ViewerError> {
            self.0.begin_run().unwrap();
            Ok("http://localhost:3000".to_string())
        }
    }

    #[tokio::test]
    async fn open_without_published_viewer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let (code, Json(body)) = open(State(StatusFeed::from_ref(&state)))
            .await
            .unwrap_err();

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No viewer available");
    }

    #[tokio::test]
    async fn start_records_viewer_url() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let Json(body) = start(State(Orchestrator::from_ref(&state))).await.unwrap();

        assert_eq!(body.url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(
            state.orchestrator.status().snapshot().viewer_url.as_deref(),
            Some("http://localhost:3000")
        );
    }

    #[tokio::test]
    async fn start_is_refused_while_a_run_is_active() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        state.orchestrator.start("red label").unwrap();

        let (code, Json(body)) = start(State(Orchestrator::from_ref(&state)))
            .await
            .unwrap_err();

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Pipeline already running");
    }

    #[tokio::test]
    async fn start_does_not_record_url_once_a_run_has_begun() {
        let status = Arc::new(StatusRecord::new());
        let orchestrator = Orchestrator::new(
            status.clone(),
            Arc::new(RunStartsDuringPublish(status.clone())),
        );

        let (code, Json(body)) = start(State(orchestrator)).await.unwrap_err();

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Pipeline already running");
        assert!(status.snapshot().is_running);
        assert_eq!(status.snapshot().viewer_url, None);
    }
}
