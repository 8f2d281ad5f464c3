use crate::error::OperationError;
use crate::pipeline::Tool;
use serde::{Deserialize, Serialize};

/// Operating variant of a codec-style tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Encode,
    Decode,
}

impl Direction {
    /// Parse the words used on the command line (`encode`, `decode`).
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "encode" | "enc" => Some(Direction::Encode),
            "decode" | "dec" => Some(Direction::Decode),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Encode => "encode",
            Direction::Decode => "decode",
        }
    }
}

/// Mode type for tools that have a single operating variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Single {
    #[default]
    Only,
}

/// Last reconciled result of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Output<O> {
    /// Input is empty or fails the tool's local precondition.
    #[default]
    Empty,
    Ready(O),
    Failed(OperationError),
}

impl<O> Output<O> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Empty)
    }

    pub fn ready(&self) -> Option<&O> {
        match self {
            Output::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&OperationError> {
        match self {
            Output::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// A named operation call as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub operation: &'static str,
    pub params: serde_json::Value,
}

/// Full state of one tool's pipeline, published as a snapshot after every transition.
#[derive(Serialize)]
#[serde(bound = "")]
pub struct PipelineState<T: Tool> {
    pub input: T::Input,
    pub mode: T::Mode,
    pub params: T::Params,
    /// Id of the most recent evaluation; results carrying an older id are dropped.
    pub request_id: u64,
    pub output: Output<T::Output>,
    /// True exactly while the request with `request_id` is outstanding.
    pub loading: bool,
}

impl<T: Tool> PipelineState<T> {
    pub fn new(input: T::Input, mode: T::Mode, params: T::Params) -> Self {
        Self {
            input,
            mode,
            params,
            request_id: 0,
            output: Output::Empty,
            loading: false,
        }
    }
}

impl<T: Tool> Default for PipelineState<T> {
    fn default() -> Self {
        Self::new(T::Input::default(), T::Mode::default(), T::Params::default())
    }
}

// Manual impls: derives would demand `T: Clone`/`T: Debug` on the marker type.
impl<T: Tool> Clone for PipelineState<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            mode: self.mode,
            params: self.params.clone(),
            request_id: self.request_id,
            output: self.output.clone(),
            loading: self.loading,
        }
    }
}

impl<T: Tool> std::fmt::Debug for PipelineState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("route", &T::ROUTE)
            .field("input", &self.input)
            .field("mode", &self.mode)
            .field("params", &self.params)
            .field("request_id", &self.request_id)
            .field("output", &self.output)
            .field("loading", &self.loading)
            .finish()
    }
}
