pub mod backend;
pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod session;
pub mod settings;
mod text_summary;
pub mod tools;
