mod dependency_report;
mod pipeline_status;
mod step_result;

pub use dependency_report::*;
pub use pipeline_status::*;
pub use step_result::*;
