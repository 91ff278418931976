pub mod broadcast;
pub mod config;
pub mod dtos;
pub mod error;
pub mod orchestrator;
pub mod prerequisites;
pub mod stage;
pub mod status;
pub mod step_runner;
pub mod telemetry;
pub mod toolchain;
pub mod trigger;
pub mod viewer;

pub use broadcast::Subscription;
pub use config::Config;
pub use dtos::{DependencyReport, PipelineStatus, StepResult};
pub use error::{ConfigError, PipelineError, StartError, ViewerError};
pub use orchestrator::Orchestrator;
pub use stage::Stage;
pub use status::StatusRecord;
pub use step_runner::{CommandSpec, StepRunner};
pub use toolchain::{ExternalToolchain, Toolchain};
pub use trigger::{PollOutcome, TriggerLoop, WatchState};
pub use viewer::ViewerLauncher;

/// Prompt used when a caller does not supply one.
pub static DEFAULT_PROMPT: &str = "A professional golf ball label design with elegant typography, clean white background, landscape orientation, suitable for 3D model texturing";
