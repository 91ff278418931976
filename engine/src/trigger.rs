use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{dtos::StepResult, toolchain::Toolchain};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchState {
    pub last_observed: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The file is absent or unreadable; nothing recorded.
    Missing,
    /// First sighting; timestamp recorded without rebuilding.
    Baseline,
    Unchanged,
    Rebuilt(StepResult),
}

/// Re-runs the export step whenever the watched file's mtime changes.
pub struct TriggerLoop {
    path: PathBuf,
    interval: Duration,
    toolchain: Arc<dyn Toolchain>,
    state: WatchState,
}

impl TriggerLoop {
    pub fn new(
        path: impl Into<PathBuf>,
        interval: Duration,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            path: path.into(),
            interval,
            toolchain,
            state: WatchState::default(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        let modified = match tokio::fs::metadata(&self.path)
            .await
            .and_then(|metadata| metadata.modified())
        {
            Ok(modified) => modified,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("Watched file not found: {}", self.path.display());
                return PollOutcome::Missing;
            }
            Err(error) => {
                warn!("Cannot read {}: {error}", self.path.display());
                return PollOutcome::Missing;
            }
        };

        match self.state.last_observed {
            None => {
                debug!("Baseline recorded for {}", self.path.display());
                self.state.last_observed = Some(modified);
                PollOutcome::Baseline
            }
            Some(last) if last == modified => PollOutcome::Unchanged,
            Some(_) => {
                info!("Detected change in {}, rebuilding asset", self.path.display());

                let result = self.toolchain.export().await;

                // Recorded even on failure so an unchanged file is not retried in a tight loop.
                self.state.last_observed = Some(modified);

                if result.ok {
                    info!("Asset rebuilt");
                } else {
                    warn!("Asset rebuild failed: {}", result.diagnostic());
                }

                PollOutcome::Rebuilt(result)
            }
        }
    }

    /// Polls forever; ends only when the task is aborted or the runtime shuts down.
    pub async fn run(mut self) {
        info!(
            "Watching {} every {}s",
            self.path.display(),
            self.interval.as_secs_f32()
        );

        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use async_trait::async_trait;
    use std::{
        fs::File,
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
        time::UNIX_EPOCH,
    };

    #[derive(Default)]
    struct CountingExport {
        exports: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Toolchain for CountingExport {
        async fn generate(&self, _prompt: &str) -> StepResult {
            StepResult::success()
        }

        async fn export(&self) -> StepResult {
            self.exports.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                StepResult::failure("blender crashed")
            } else {
                StepResult::success()
            }
        }

        async fn publish(&self) -> Result<String, ViewerError> {
            Err(ViewerError::NotPublished)
        }
    }

    fn touch(path: &Path, secs: u64) {
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn watcher(path: &Path, toolchain: &Arc<CountingExport>) -> TriggerLoop {
        TriggerLoop::new(path, Duration::from_millis(10), toolchain.clone())
    }

    #[tokio::test]
    async fn file_created_after_start_sets_baseline_then_triggers_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        let toolchain = Arc::new(CountingExport::default());
        let mut trigger = watcher(&path, &toolchain);

        assert_eq!(trigger.poll_once().await, PollOutcome::Missing);
        assert_eq!(trigger.state().last_observed, None);

        touch(&path, 1_700_000_000);
        assert_eq!(trigger.poll_once().await, PollOutcome::Baseline);
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 0);

        touch(&path, 1_700_000_010);
        assert_eq!(
            trigger.poll_once().await,
            PollOutcome::Rebuilt(StepResult::success())
        );
        assert_eq!(trigger.poll_once().await, PollOutcome::Unchanged);
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 1);

        touch(&path, 1_700_000_020);
        trigger.poll_once().await;
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unchanged_file_never_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        touch(&path, 1_700_000_000);
        let toolchain = Arc::new(CountingExport::default());
        let mut trigger = watcher(&path, &toolchain);

        for _ in 0..5 {
            trigger.poll_once().await;
        }

        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_export_still_records_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        touch(&path, 1_700_000_000);
        let toolchain = Arc::new(CountingExport {
            fail: true,
            ..CountingExport::default()
        });
        let mut trigger = watcher(&path, &toolchain);
        trigger.poll_once().await;

        touch(&path, 1_700_000_050);
        let outcome = trigger.poll_once().await;

        assert!(matches!(outcome, PollOutcome::Rebuilt(ref result) if !result.ok));
        assert_eq!(
            trigger.state().last_observed,
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_050))
        );
        assert_eq!(trigger.poll_once().await, PollOutcome::Unchanged);
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deleted_file_is_skipped_and_keeps_last_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        touch(&path, 1_700_000_000);
        let toolchain = Arc::new(CountingExport::default());
        let mut trigger = watcher(&path, &toolchain);
        trigger.poll_once().await;

        std::fs::remove_file(&path).unwrap();

        assert_eq!(trigger.poll_once().await, PollOutcome::Missing);
        assert!(trigger.state().last_observed.is_some());
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn spawned_loop_keeps_polling_until_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        touch(&path, 1_700_000_000);
        let toolchain = Arc::new(CountingExport::default());
        let handle = watcher(&path, &toolchain).spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        touch(&path, 1_700_000_100);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!handle.is_finished());
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(toolchain.exports.load(Ordering::SeqCst), 1);
    }
}
