use crate::model::{Direction, Request};
use crate::orchestrator::LineDriven;
use crate::pipeline::Tool;
use anyhow::Result;
use serde_json::json;

/// Percent-encoding of URL components.
pub struct UrlCodec;

impl Tool for UrlCodec {
    type Input = String;
    type Mode = Direction;
    type Params = ();
    type Output = String;

    const ROUTE: &'static str = "/codec/url";

    fn should_invoke(input: &String, _: &()) -> bool {
        !input.is_empty()
    }

    fn request(input: &String, mode: Direction, _: &()) -> Request {
        let operation = match mode {
            Direction::Encode => "encode_url",
            Direction::Decode => "decode_url",
        };
        Request {
            operation,
            params: json!({ "input": input }),
        }
    }
}

impl LineDriven for UrlCodec {
    fn apply_line(input: &mut String, _: &mut (), line: &str) -> Result<()> {
        *input = line.to_string();
        Ok(())
    }

    fn parse_mode(word: &str) -> Option<Direction> {
        Direction::from_word(word)
    }

    fn apply_setting(_: &mut String, _: &mut (), key: &str, _: &str) -> Result<()> {
        anyhow::bail!("url has no setting {key:?}")
    }

    fn render(output: &String) -> Vec<String> {
        vec![output.clone()]
    }
}
