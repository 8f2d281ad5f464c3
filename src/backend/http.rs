use super::{Backend, InvokeResult};
use crate::error::OperationError;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::time::Duration;

/// Remote engine reached over HTTP: `POST {base_url}/invoke/{operation}` with JSON params.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("devkit/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, operation: &str) -> String {
        format!("{}/invoke/{}", self.base_url, operation)
    }
}

impl Backend for HttpBackend {
    fn invoke(&self, operation: &str, params: Value) -> BoxFuture<'static, InvokeResult> {
        let client = self.client.clone();
        let url = self.endpoint(operation);
        async move {
            let resp = client
                .post(&url)
                .json(&params)
                .send()
                .await
                .map_err(|e| OperationError::new(format!("transport error: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                // The engine reports failures as the response body.
                let body = resp.text().await.unwrap_or_default();
                let message = if body.trim().is_empty() {
                    format!("engine returned {status}")
                } else {
                    body.trim().trim_matches('"').to_string()
                };
                tracing::debug!(%url, %status, "remote operation failed");
                return Err(OperationError::new(message));
            }

            resp.json::<Value>()
                .await
                .map_err(|e| OperationError::new(format!("invalid engine response: {e}")))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let backend = HttpBackend::new("http://127.0.0.1:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.endpoint("encode_url"),
            "http://127.0.0.1:9000/invoke/encode_url"
        );
    }

    #[tokio::test]
    async fn unreachable_engine_is_an_operation_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = backend
            .invoke("encode_url", serde_json::json!({"input": "x"}))
            .await
            .unwrap_err();
        assert!(err.message().starts_with("transport error"));
    }
}
