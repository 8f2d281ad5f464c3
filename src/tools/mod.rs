//! Tool definitions bundled with the binary.
//!
//! Each tool names its route, its state shapes, and the backend operation its
//! state maps to. The pipeline and session machinery are shared.

mod base64_text;
mod password;
mod regex;
mod url;

pub use base64_text::{Base64Mode, Base64Params, Base64Text};
pub use password::{PasswordGenerator, PasswordParams};
pub use regex::{RegexInput, RegexParams, RegexTester};
pub use url::UrlCodec;

/// Parse a boolean setting value as typed on the command line.
pub(crate) fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
