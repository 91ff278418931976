use serde::{Deserialize, Serialize};

/// Snapshot of pipeline progress as seen by every observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub is_running: bool,
    pub current_step: Option<String>,
    pub progress: u8,
    pub error: Option<String>,
    pub viewer_url: Option<String>,
}

impl PipelineStatus {
    /// Idle, completed or failed. Only terminal records accept a new run.
    pub fn is_terminal(&self) -> bool {
        !self.is_running
    }
}
