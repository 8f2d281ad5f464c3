//! Reactive transformation pipeline shared by every tool view.

mod controller;
mod tool;

pub use controller::PipelineController;
pub use tool::{Tool, ToolValue};
