use std::{future::Future, sync::Arc};

use axum::extract::FromRef;
use engine::{Config, Orchestrator, StatusRecord};
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config: Arc<Config>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: Arc<Config>, shutdown: Shutdown) -> Self {
        Self {
            orchestrator,
            config,
            shutdown,
        }
    }
}

/// Process-wide stop signal; long-lived event streams end when it fires.
#[derive(Clone, Debug)]
pub struct Shutdown(Arc<watch::Sender<bool>>);

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self(Arc::new(sender))
    }

    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    /// Resolves once `trigger` has been called, including before this call.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.0.subscribe();

        async move {
            let _ = receiver.wait_for(|stopped| *stopped).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl FromRef<AppState> for Shutdown {
    fn from_ref(state: &AppState) -> Self {
        state.shutdown.clone()
    }
}

impl FromRef<AppState> for Orchestrator {
    fn from_ref(state: &AppState) -> Self {
        state.orchestrator.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Read side of the status record: snapshots and live subscriptions.
#[derive(Clone)]
pub struct StatusFeed(pub Arc<StatusRecord>);

impl FromRef<AppState> for StatusFeed {
    fn from_ref(state: &AppState) -> Self {
        Self(state.orchestrator.status().clone())
    }
}
