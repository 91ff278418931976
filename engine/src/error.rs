use std::io;

use thiserror::Error;

use crate::stage::Stage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine installation root: {0}")]
    Root(#[source] io::Error),
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Why a `start` request was refused. Neither case touches the status record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("Prompt is required")]
    EmptyPrompt,
    #[error("Pipeline already running")]
    AlreadyRunning,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("web app directory not found: {0}")]
    MissingProject(String),
    #[error("package.json not found in: {0}")]
    MissingManifest(String),
    #[error("npm not found, install Node.js and npm")]
    NpmNotFound,
    #[error("failed to install dependencies: {0}")]
    InstallFailed(String),
    #[error("failed to launch server: {0}")]
    Launch(#[source] io::Error),
    #[error("server at {url} is not reachable: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("No viewer available")]
    NotPublished,
}

/// Failure taxonomy surfaced to observers and callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing prerequisites: {}", .0.join("; "))]
    PrerequisiteMissing(Vec<String>),
    #[error("{} failed: {diagnostic}", .stage.label())]
    StageFailure { stage: Stage, diagnostic: String },
    #[error("{} {diagnostic}", .stage.label())]
    StageTimeout { stage: Stage, diagnostic: String },
    #[error("Failed to start web viewer: {0}")]
    ViewerFailure(#[from] ViewerError),
    #[error("pipeline worker aborted: {0}")]
    WorkerAborted(String),
}
