//! In-process computation engine.
//!
//! Implements the handful of operations the bundled tools need, using the same
//! operation names and parameter shapes as the remote engine.

use super::{Backend, InvokeResult};
use crate::error::OperationError;
use base64::prelude::{
    BASE64_STANDARD, BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE, BASE64_URL_SAFE_NO_PAD,
};
use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use regex::RegexBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const NUMERIC_CHARS: &str = "0123456789";
const LOWERCASE_CHARS: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?";

/// Upper bound on `generate_password`'s `length`.
pub const MAX_PASSWORD_LENGTH: u16 = 4096;
/// Upper bound on `generate_password`'s `size` (passwords per call).
pub const MAX_PASSWORD_COUNT: u16 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Base64Mode {
    #[default]
    Standard,
    StandardNoPad,
    UrlSafe,
    UrlSafeNoPad,
}

impl Base64Mode {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Base64Mode::Standard => BASE64_STANDARD.encode(bytes),
            Base64Mode::StandardNoPad => BASE64_STANDARD_NO_PAD.encode(bytes),
            Base64Mode::UrlSafe => BASE64_URL_SAFE.encode(bytes),
            Base64Mode::UrlSafeNoPad => BASE64_URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    pub fn decode(&self, base64: &str) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Base64Mode::Standard => BASE64_STANDARD.decode(base64),
            Base64Mode::StandardNoPad => BASE64_STANDARD_NO_PAD.decode(base64),
            Base64Mode::UrlSafe => BASE64_URL_SAFE.decode(base64),
            Base64Mode::UrlSafeNoPad => BASE64_URL_SAFE_NO_PAD.decode(base64),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "standard" => Some(Base64Mode::Standard),
            "standardnopad" => Some(Base64Mode::StandardNoPad),
            "urlsafe" => Some(Base64Mode::UrlSafe),
            "urlsafenopad" => Some(Base64Mode::UrlSafeNoPad),
            _ => None,
        }
    }
}

/// One regex match or capture group, with byte offsets into the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl<'a> From<regex::Match<'a>> for Match {
    fn from(value: regex::Match<'a>) -> Self {
        Self {
            start: value.start(),
            end: value.end(),
            value: value.as_str().to_string(),
        }
    }
}

/// Whole match followed by its participating groups.
pub type Captures = Vec<Match>;

#[derive(Deserialize)]
struct EncodeBase64Params {
    text: String,
    mode: Base64Mode,
}

#[derive(Deserialize)]
struct DecodeBase64Params {
    base64: String,
    mode: Base64Mode,
}

#[derive(Deserialize)]
struct UrlParams {
    input: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegexParams {
    text: String,
    pattern: String,
    global: bool,
    multi_line: bool,
    case_insensitive: bool,
    #[serde(default = "default_true")]
    unicode: bool,
}

#[derive(Deserialize)]
struct PasswordParams {
    size: u16,
    length: u16,
    uppercase: bool,
    lowercase: bool,
    numeric: bool,
    special: bool,
    #[serde(default)]
    excludes: String,
}

fn default_true() -> bool {
    true
}

/// In-process backend with an optional artificial latency per call.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    latency: Option<Duration>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`, simulating a slow out-of-process engine.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: (!latency.is_zero()).then_some(latency),
        }
    }
}

impl Backend for LocalBackend {
    fn invoke(&self, operation: &str, params: Value) -> BoxFuture<'static, InvokeResult> {
        let latency = self.latency;
        let operation = operation.to_string();
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let result = dispatch(&operation, params);
            match &result {
                Ok(_) => tracing::debug!(%operation, "local operation completed"),
                Err(e) => tracing::debug!(%operation, error = %e, "local operation failed"),
            }
            result
        }
        .boxed()
    }
}

fn dispatch(operation: &str, params: Value) -> InvokeResult {
    match operation {
        "encode_text_base64" => {
            let p: EncodeBase64Params = parse(params)?;
            to_value(p.mode.encode(p.text.as_bytes()))
        }
        "decode_text_base64" => {
            let p: DecodeBase64Params = parse(params)?;
            let bytes = p
                .mode
                .decode(&p.base64)
                .map_err(|e| OperationError::new(format!("decode base64 error: {e}")))?;
            let text = String::from_utf8(bytes)
                .map_err(|e| OperationError::new(format!("utf-8 error: {e}")))?;
            to_value(text)
        }
        "encode_url" => {
            let p: UrlParams = parse(params)?;
            to_value(urlencoding::encode(&p.input).into_owned())
        }
        "decode_url" => {
            let p: UrlParams = parse(params)?;
            let decoded = urlencoding::decode(&p.input)
                .map_err(|e| OperationError::new(format!("utf-8 error: {e}")))?;
            to_value(decoded.into_owned())
        }
        "parse_regex" => {
            let p: RegexParams = parse(params)?;
            to_value(parse_regex(&p)?)
        }
        "generate_password" => {
            let p: PasswordParams = parse(params)?;
            if p.length > MAX_PASSWORD_LENGTH {
                return Err(OperationError::new(format!(
                    "length must be at most {MAX_PASSWORD_LENGTH}"
                )));
            }
            if p.size > MAX_PASSWORD_COUNT {
                return Err(OperationError::new(format!(
                    "size must be at most {MAX_PASSWORD_COUNT}"
                )));
            }
            to_value(generate_password(&p))
        }
        other => Err(OperationError::new(format!("unknown operation: {other}"))),
    }
}

fn parse<P: DeserializeOwned>(params: Value) -> Result<P, OperationError> {
    serde_json::from_value(params)
        .map_err(|e| OperationError::new(format!("invalid parameters: {e}")))
}

fn to_value<V: Serialize>(value: V) -> InvokeResult {
    serde_json::to_value(value).map_err(OperationError::from_display)
}

fn parse_regex(p: &RegexParams) -> Result<Vec<Captures>, OperationError> {
    let regex = RegexBuilder::new(&p.pattern)
        .case_insensitive(p.case_insensitive)
        .multi_line(p.multi_line)
        .unicode(p.unicode)
        .build()
        .map_err(OperationError::from_display)?;

    fn captures(captures: regex::Captures<'_>) -> Captures {
        captures.iter().flatten().map(Match::from).collect()
    }

    if p.global {
        Ok(regex.captures_iter(&p.text).map(captures).collect())
    } else {
        Ok(regex.captures(&p.text).into_iter().map(captures).collect())
    }
}

fn generate_password(p: &PasswordParams) -> Vec<String> {
    let mut chars = String::new();
    if p.uppercase {
        chars.push_str(UPPERCASE_CHARS);
    }
    if p.lowercase {
        chars.push_str(LOWERCASE_CHARS);
    }
    if p.numeric {
        chars.push_str(NUMERIC_CHARS);
    }
    if p.special {
        chars.push_str(SPECIAL_CHARS);
    }
    chars.retain(|c| !p.excludes.contains(c));
    let chars: Vec<char> = chars.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut rng = rand::thread_rng();
    (0..p.size)
        .map(|_| {
            (0..p.length)
                .map(|_| chars[rng.gen_range(0..chars.len())])
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn call(operation: &str, params: Value) -> InvokeResult {
        LocalBackend::new().invoke(operation, params).await
    }

    #[tokio::test]
    async fn base64_variants() {
        let out = call(
            "encode_text_base64",
            json!({"text": "hello?>", "mode": "UrlSafeNoPad"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!("aGVsbG8_Pg"));

        let out = call(
            "decode_text_base64",
            json!({"base64": "aGVsbG8/Pg==", "mode": "Standard"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!("hello?>"));
    }

    #[tokio::test]
    async fn base64_decode_failure_is_an_operation_error() {
        let err = call(
            "decode_text_base64",
            json!({"base64": "not base64!", "mode": "Standard"}),
        )
        .await
        .unwrap_err();
        assert!(err.message().starts_with("decode base64 error"));
    }

    #[tokio::test]
    async fn url_round_trip_through_operations() {
        let encoded = call("encode_url", json!({"input": "a b&c=d"})).await.unwrap();
        assert_eq!(encoded, json!("a%20b%26c%3Dd"));
        let decoded = call("decode_url", encoded_params(&encoded)).await.unwrap();
        assert_eq!(decoded, json!("a b&c=d"));
    }

    fn encoded_params(encoded: &Value) -> Value {
        json!({ "input": encoded })
    }

    #[tokio::test]
    async fn regex_global_and_single() {
        let params = |global: bool| {
            json!({
                "text": "a1 b22 c333",
                "pattern": r"([a-z])(\d+)",
                "global": global,
                "multiLine": false,
                "caseInsensitive": false,
            })
        };
        let all: Vec<Captures> =
            serde_json::from_value(call("parse_regex", params(true)).await.unwrap()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(
            all[1],
            vec![
                Match { start: 3, end: 6, value: "b22".into() },
                Match { start: 3, end: 4, value: "b".into() },
                Match { start: 4, end: 6, value: "22".into() },
            ]
        );

        let first: Vec<Captures> =
            serde_json::from_value(call("parse_regex", params(false)).await.unwrap()).unwrap();
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn invalid_regex_fails() {
        let err = call(
            "parse_regex",
            json!({"text": "x", "pattern": "(", "global": true, "multiLine": false, "caseInsensitive": false}),
        )
        .await
        .unwrap_err();
        assert!(!err.message().is_empty());
    }

    #[tokio::test]
    async fn password_respects_classes_and_excludes() {
        let out = call(
            "generate_password",
            json!({"size": 3, "length": 16, "uppercase": false, "lowercase": false,
                   "numeric": true, "special": false, "excludes": "01"}),
        )
        .await
        .unwrap();
        let passwords: Vec<String> = serde_json::from_value(out).unwrap();
        assert_eq!(passwords.len(), 3);
        for p in passwords {
            assert_eq!(p.len(), 16);
            assert!(p.chars().all(|c| ('2'..='9').contains(&c)));
        }

        let none = call(
            "generate_password",
            json!({"size": 2, "length": 8, "uppercase": false, "lowercase": false,
                   "numeric": false, "special": false}),
        )
        .await
        .unwrap();
        assert_eq!(none, json!([]));
    }

    #[tokio::test]
    async fn oversized_password_requests_are_rejected() {
        let err = call(
            "generate_password",
            json!({"size": 65535, "length": 65535, "uppercase": true, "lowercase": true,
                   "numeric": true, "special": true}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "length must be at most 4096");

        let err = call(
            "generate_password",
            json!({"size": 1001, "length": 8, "uppercase": true, "lowercase": false,
                   "numeric": false, "special": false}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "size must be at most 1000");
    }

    #[tokio::test]
    async fn unknown_operation() {
        let err = call("format_cobol", json!({})).await.unwrap_err();
        assert_eq!(err.message(), "unknown operation: format_cobol");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_the_response() {
        let backend = LocalBackend::with_latency(Duration::from_millis(200));
        let start = tokio::time::Instant::now();
        backend
            .invoke("encode_url", json!({"input": "x"}))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
