//! Application-level orchestration.
//!
//! Binds a tool's session entry to its pipeline controller and drives the
//! resulting view from line-oriented UI commands. UI/CLI layers call into this
//! module so the pipeline and the session store stay independent of each other.

mod controller;
mod view;

pub use controller::{parse_command, run_view, UiCommand, ViewEvent};
pub use view::{ToolSession, ToolView};

use crate::pipeline::Tool;
use anyhow::Result;

/// Maps line-oriented user input onto a tool's state.
pub trait LineDriven: Tool {
    /// Apply one plain input line, usually by replacing the main input field.
    fn apply_line(input: &mut Self::Input, params: &mut Self::Params, line: &str) -> Result<()>;

    /// Parse a mode word; `None` if the tool has no such mode.
    fn parse_mode(word: &str) -> Option<Self::Mode>;

    /// Apply a `key value` setting to either the input or the params.
    fn apply_setting(
        input: &mut Self::Input,
        params: &mut Self::Params,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Human-readable lines for a successful output.
    fn render(output: &Self::Output) -> Vec<String>;
}
