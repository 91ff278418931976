use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::{
    broadcast::{Broadcaster, Subscription},
    dtos::PipelineStatus,
    error::StartError,
    stage::{Stage, COMPLETE_STEP},
};

/// Owner of the single `PipelineStatus` and its observer registry.
///
/// Every mutation takes the lock, applies the change, snapshots the record and
/// publishes the snapshot before releasing it, so observers see transitions in
/// order and a subscriber registered under the same lock never misses one.
#[derive(Debug, Default)]
pub struct StatusRecord {
    status: Mutex<PipelineStatus>,
    broadcaster: Broadcaster,
}

impl StatusRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PipelineStatus {
        self.status().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        let status = self.status();
        self.broadcaster.register(status.clone())
    }

    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }

    /// Claims the record for a new run, or rejects without touching it.
    pub fn begin_run(&self) -> Result<PipelineStatus, StartError> {
        let mut status = self.status();

        if status.is_running {
            return Err(StartError::AlreadyRunning);
        }

        status.is_running = true;
        status.current_step = None;
        status.progress = 0;
        status.error = None;

        Ok(self.publish(&status))
    }

    pub fn enter_stage(&self, stage: Stage) -> PipelineStatus {
        self.mutate(|status| {
            status.current_step = Some(stage.label().to_string());
            status.progress = status.progress.max(stage.progress());
        })
    }

    pub fn fail(&self, error: impl Into<String>) -> PipelineStatus {
        let error = error.into();

        self.mutate(|status| {
            if !status.is_running {
                warn!("Recording failure on an idle record: {error}");
            }

            status.is_running = false;
            status.error = Some(error);
        })
    }

    pub fn complete(&self, viewer_url: impl Into<String>) -> PipelineStatus {
        let viewer_url = viewer_url.into();

        self.mutate(|status| {
            status.is_running = false;
            status.progress = 100;
            status.current_step = Some(COMPLETE_STEP.to_string());
            status.error = None;
            status.viewer_url = Some(viewer_url);
        })
    }

    /// Records a viewer published outside a pipeline run.
    ///
    /// Refused once a run has claimed the record; that run owns `viewerUrl`.
    pub fn record_viewer_url_if_idle(
        &self,
        viewer_url: impl Into<String>,
    ) -> Result<PipelineStatus, StartError> {
        let mut status = self.status();

        if status.is_running {
            return Err(StartError::AlreadyRunning);
        }

        status.viewer_url = Some(viewer_url.into());

        Ok(self.publish(&status))
    }

    fn mutate<F>(&self, apply: F) -> PipelineStatus
    where
        F: FnOnce(&mut PipelineStatus),
    {
        let mut status = self.status();
        apply(&mut status);
        self.publish(&status)
    }

    fn publish(&self, status: &PipelineStatus) -> PipelineStatus {
        let delivered = self.broadcaster.publish(status);
        debug!(
            "Status published to {delivered} observers: step={:?} progress={}",
            status.current_step, status.progress
        );

        status.clone()
    }

    fn status(&self) -> MutexGuard<'_, PipelineStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
