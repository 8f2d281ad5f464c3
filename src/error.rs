use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failure reported by the computation backend for one request.
///
/// The message is opaque to the pipeline; it is displayed in place of the
/// normal output and never propagated further.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Stringify any displayable error, the way command errors cross the boundary.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// Errors cross the boundary as plain strings.
impl Serialize for OperationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.message.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OperationError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Failure of the durable storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_serializes_as_plain_string() {
        let err = OperationError::new("decode base64 error: Invalid padding");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"decode base64 error: Invalid padding\"");
        let back: OperationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn store_error_names_the_path() {
        let err = StoreError::io(
            "/tmp/devkit/session.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/devkit/session.json"));
    }
}
