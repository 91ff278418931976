use serde::{Deserialize, Serialize};

/// Normalized outcome of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub ok: bool,
    pub diagnostic: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
}

impl StepResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            diagnostic: None,
            timed_out: false,
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: Some(diagnostic.into()),
            timed_out: false,
        }
    }

    pub fn timeout(diagnostic: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(diagnostic)
        }
    }

    pub fn diagnostic(&self) -> &str {
        self.diagnostic.as_deref().unwrap_or("unknown error")
    }
}
