//! External operation boundary.
//!
//! The computation backend is reachable only through `invoke(name, params)`.
//! Responses may arrive in any order; reconciling them is the pipeline's job.

mod http;
mod local;

pub use http::HttpBackend;
pub use local::{
    Base64Mode, Captures, LocalBackend, Match, MAX_PASSWORD_COUNT, MAX_PASSWORD_LENGTH,
};

use crate::error::OperationError;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;

pub type InvokeResult = Result<Value, OperationError>;

/// An asynchronous, fallible, non-cancelable remote operation.
pub trait Backend: Send + Sync + 'static {
    fn invoke(&self, operation: &str, params: Value) -> BoxFuture<'static, InvokeResult>;
}

/// Backend backed by a closure. Used for stubs and for wiring ad-hoc engines.
pub struct FnBackend<F> {
    f: F,
}

/// Wrap a closure `(operation, params) -> Future<Output = InvokeResult>` as a [`Backend`].
pub fn from_fn<F, Fut>(f: F) -> FnBackend<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InvokeResult> + Send + 'static,
{
    FnBackend { f }
}

impl<F, Fut> Backend for FnBackend<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InvokeResult> + Send + 'static,
{
    fn invoke(&self, operation: &str, params: Value) -> BoxFuture<'static, InvokeResult> {
        (self.f)(operation.to_string(), params).boxed()
    }
}
