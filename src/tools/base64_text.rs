use crate::model::{Direction, Request};
use crate::orchestrator::LineDriven;
use crate::pipeline::Tool;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use crate::backend::Base64Mode;

/// Text to Base64 and back.
pub struct Base64Text;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Base64Params {
    pub variant: Base64Mode,
}

impl Tool for Base64Text {
    type Input = String;
    type Mode = Direction;
    type Params = Base64Params;
    type Output = String;

    const ROUTE: &'static str = "/codec/base64-text";

    fn should_invoke(input: &String, _: &Base64Params) -> bool {
        !input.is_empty()
    }

    fn request(input: &String, mode: Direction, params: &Base64Params) -> Request {
        match mode {
            Direction::Encode => Request {
                operation: "encode_text_base64",
                params: json!({ "text": input, "mode": params.variant }),
            },
            Direction::Decode => Request {
                operation: "decode_text_base64",
                params: json!({ "base64": input, "mode": params.variant }),
            },
        }
    }
}

impl LineDriven for Base64Text {
    fn apply_line(input: &mut String, _: &mut Base64Params, line: &str) -> Result<()> {
        *input = line.to_string();
        Ok(())
    }

    fn parse_mode(word: &str) -> Option<Direction> {
        Direction::from_word(word)
    }

    fn apply_setting(
        _: &mut String,
        params: &mut Base64Params,
        key: &str,
        value: &str,
    ) -> Result<()> {
        match key {
            "variant" | "mode" => {
                params.variant = Base64Mode::from_name(value).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown variant {value:?} (Standard, StandardNoPad, UrlSafe, UrlSafeNoPad)"
                    )
                })?;
                Ok(())
            }
            other => anyhow::bail!("unknown setting {other:?} for base64"),
        }
    }

    fn render(output: &String) -> Vec<String> {
        vec![output.clone()]
    }
}
