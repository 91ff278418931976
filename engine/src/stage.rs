pub static COMPLETE_STEP: &str = "Complete";

/// A discrete phase of a pipeline run, each backed by one external tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generating,
    Exporting,
    Publishing,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Generating => "Generating Image",
            Stage::Exporting => "Updating 3D Model",
            Stage::Publishing => "Starting Web Viewer",
        }
    }

    /// Progress reported while the stage is in flight.
    pub fn progress(self) -> u8 {
        match self {
            Stage::Generating => 25,
            Stage::Exporting => 75,
            Stage::Publishing => 90,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
