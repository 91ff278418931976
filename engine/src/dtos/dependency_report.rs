use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub issues: Vec<String>,
    pub ready: bool,
}

impl From<Vec<String>> for DependencyReport {
    fn from(issues: Vec<String>) -> Self {
        Self {
            ready: issues.is_empty(),
            issues,
        }
    }
}
