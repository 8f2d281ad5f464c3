use super::parse_flag;
use crate::backend::Captures;
use crate::model::{Request, Single};
use crate::orchestrator::LineDriven;
use crate::pipeline::Tool;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Regular expression tester: lists matches and capture groups of a pattern in a text.
pub struct RegexTester;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexInput {
    pub pattern: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexParams {
    /// Find every match instead of stopping after the first.
    pub global: bool,
    pub multi_line: bool,
    pub case_insensitive: bool,
}

impl Default for RegexParams {
    fn default() -> Self {
        Self {
            global: true,
            multi_line: false,
            case_insensitive: false,
        }
    }
}

impl Tool for RegexTester {
    type Input = RegexInput;
    type Mode = Single;
    type Params = RegexParams;
    type Output = Vec<Captures>;

    const ROUTE: &'static str = "/text/regex";

    fn should_invoke(input: &RegexInput, _: &RegexParams) -> bool {
        !input.pattern.is_empty() && !input.text.is_empty()
    }

    fn request(input: &RegexInput, _: Single, params: &RegexParams) -> Request {
        Request {
            operation: "parse_regex",
            params: json!({
                "text": input.text,
                "pattern": input.pattern,
                "global": params.global,
                "multiLine": params.multi_line,
                "caseInsensitive": params.case_insensitive,
                "unicode": true,
            }),
        }
    }
}

impl LineDriven for RegexTester {
    fn apply_line(input: &mut RegexInput, _: &mut RegexParams, line: &str) -> Result<()> {
        input.text = line.to_string();
        Ok(())
    }

    fn parse_mode(_: &str) -> Option<Single> {
        None
    }

    fn apply_setting(
        input: &mut RegexInput,
        params: &mut RegexParams,
        key: &str,
        value: &str,
    ) -> Result<()> {
        match key {
            "pattern" => input.pattern = value.to_string(),
            "global" => params.global = parse_flag(value)?,
            "multiline" | "multi_line" => params.multi_line = parse_flag(value)?,
            "ignorecase" | "case_insensitive" => params.case_insensitive = parse_flag(value)?,
            other => anyhow::bail!("unknown setting {other:?} for regex"),
        }
        Ok(())
    }

    fn render(output: &Vec<Captures>) -> Vec<String> {
        if output.is_empty() {
            return vec!["no matches".into()];
        }
        let mut lines = Vec::new();
        for (i, capture) in output.iter().enumerate() {
            for (j, m) in capture.iter().enumerate() {
                if j == 0 {
                    lines.push(format!("match {}  {}-{}  {}", i + 1, m.start, m.end, m.value));
                } else {
                    lines.push(format!("  group {}  {}-{}  {}", j, m.start, m.end, m.value));
                }
            }
        }
        lines
    }
}
