//! Summary builder for CLI output.
//!
//! Formats a settled pipeline state as human-readable lines, or as a single
//! JSON line in `--json` mode.

use crate::model::{Output, PipelineState};
use crate::orchestrator::LineDriven;
use anyhow::Result;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Pre-formatted lines for output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

#[derive(Serialize)]
#[serde(bound = "")]
struct JsonRecord<'a, T: LineDriven> {
    timestamp_utc: String,
    route: &'static str,
    request_id: u64,
    mode: &'a T::Mode,
    output: &'a Output<T::Output>,
}

/// Build a summary for one settled state. An empty output yields no text lines.
pub(crate) fn build_text_summary<T: LineDriven>(
    state: &PipelineState<T>,
    json: bool,
) -> Result<TextSummary> {
    if json {
        let record = JsonRecord::<T> {
            timestamp_utc: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "now".to_string()),
            route: T::ROUTE,
            request_id: state.request_id,
            mode: &state.mode,
            output: &state.output,
        };
        return Ok(TextSummary {
            lines: vec![serde_json::to_string(&record)?],
        });
    }

    let lines = match &state.output {
        Output::Empty => Vec::new(),
        Output::Ready(value) => T::render(value),
        Output::Failed(e) => vec![format!("error: {}", e.message())],
    };
    Ok(TextSummary { lines })
}
