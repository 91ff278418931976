pub mod dependencies;
pub mod events;
pub mod pipeline;
pub mod viewer;
