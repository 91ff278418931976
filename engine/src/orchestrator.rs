use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    dtos::{PipelineStatus, StepResult},
    error::{PipelineError, StartError},
    stage::Stage,
    status::StatusRecord,
    toolchain::Toolchain,
};

/// Drives generate → export → publish runs, one at a time.
#[derive(Clone)]
pub struct Orchestrator {
    status: Arc<StatusRecord>,
    toolchain: Arc<dyn Toolchain>,
}

impl Orchestrator {
    pub fn new(status: Arc<StatusRecord>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self { status, toolchain }
    }

    pub fn status(&self) -> &Arc<StatusRecord> {
        &self.status
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        &self.toolchain
    }

    /// Claims the status record and spawns the run in the background.
    ///
    /// Returns as soon as the run is accepted; the handle resolves to the
    /// terminal status of this run.
    pub fn start(&self, prompt: &str) -> Result<JoinHandle<PipelineStatus>, StartError> {
        let prompt = prompt.trim();

        if prompt.is_empty() {
            return Err(StartError::EmptyPrompt);
        }

        self.status.begin_run()?;

        let run_id = Uuid::new_v4();
        let prompt = prompt.to_string();
        let status = Arc::clone(&self.status);
        let toolchain = Arc::clone(&self.toolchain);

        info!("Pipeline run {run_id} accepted");

        let run = async move {
            let outcome = AssertUnwindSafe(run_stages(&status, toolchain.as_ref(), &prompt))
                .catch_unwind()
                .await;

            match outcome {
                Ok(status) => status,
                Err(_) => {
                    error!("Pipeline worker panicked");
                    let error = PipelineError::WorkerAborted("worker panicked".to_string());
                    status.fail(error.to_string())
                }
            }
        };

        Ok(tokio::spawn(run.instrument(info_span!("pipeline_run", %run_id))))
    }

    /// Starts a run and waits for its terminal status.
    pub async fn run(&self, prompt: &str) -> Result<PipelineStatus, StartError> {
        let handle = self.start(prompt)?;

        match handle.await {
            Ok(status) => Ok(status),
            Err(error) => {
                error!("Pipeline worker did not finish: {error:?}");
                Ok(self
                    .status
                    .fail(PipelineError::WorkerAborted(error.to_string()).to_string()))
            }
        }
    }
}

async fn run_stages(
    status: &StatusRecord,
    toolchain: &dyn Toolchain,
    prompt: &str,
) -> PipelineStatus {
    info!("Generating image for prompt: {prompt}");
    status.enter_stage(Stage::Generating);

    if let Some(error) = stage_error(Stage::Generating, toolchain.generate(prompt).await) {
        warn!("{error}");
        return status.fail(error.to_string());
    }

    status.enter_stage(Stage::Exporting);

    if let Some(error) = stage_error(Stage::Exporting, toolchain.export().await) {
        warn!("{error}");
        return status.fail(error.to_string());
    }

    if let Some(asset_path) = toolchain.asset_path() {
        match tokio::fs::metadata(asset_path).await {
            Ok(metadata) => info!(
                "Asset exported: {} ({:.1} KB)",
                asset_path.display(),
                metadata.len() as f64 / 1024.0
            ),
            Err(_) => warn!("Exported asset not found: {}", asset_path.display()),
        }
    }

    status.enter_stage(Stage::Publishing);

    match toolchain.publish().await {
        Ok(viewer_url) => {
            info!("Pipeline complete, viewer at {viewer_url}");
            status.complete(viewer_url)
        }
        Err(error) => {
            let error = PipelineError::from(error);
            warn!("{error}");
            status.fail(error.to_string())
        }
    }
}

fn stage_error(stage: Stage, result: StepResult) -> Option<PipelineError> {
    if result.ok {
        return None;
    }

    let diagnostic = result.diagnostic().to_string();

    Some(if result.timed_out {
        PipelineError::StageTimeout { stage, diagnostic }
    } else {
        PipelineError::StageFailure { stage, diagnostic }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_name_the_stage() {
        let failure = stage_error(Stage::Exporting, StepResult::failure("no texture node"));
        let timeout = stage_error(Stage::Generating, StepResult::timeout("timed out after 60s"));

        assert_eq!(
            failure.unwrap().to_string(),
            "Updating 3D Model failed: no texture node"
        );
        assert_eq!(
            timeout.unwrap().to_string(),
            "Generating Image timed out after 60s"
        );
        assert!(stage_error(Stage::Publishing, StepResult::success()).is_none());
    }
}
