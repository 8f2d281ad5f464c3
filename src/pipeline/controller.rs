//! Pipeline controller.
//!
//! Owns input, mode, and derived output for one tool and turns a stream of
//! edits into a race-free `{output, loading}` view. Every evaluation takes a
//! new request id; a backend response is committed only if its id is still
//! the latest one when it arrives.

use super::Tool;
use crate::backend::{Backend, InvokeResult};
use crate::error::OperationError;
use crate::model::{Output, PipelineState, Request};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

struct Shared<T: Tool> {
    state: Mutex<PipelineState<T>>,
    backend: Arc<dyn Backend>,
    snapshots: watch::Sender<PipelineState<T>>,
}

/// A backend call scheduled by a state transition, issued once the lock is released.
struct PendingCall {
    request_id: u64,
    request: Request,
}

/// Reactive transformation pipeline for tool `T`.
///
/// Must be used from within a Tokio runtime: backend calls run as spawned tasks.
pub struct PipelineController<T: Tool> {
    shared: Arc<Shared<T>>,
}

impl<T: Tool> Clone for PipelineController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Tool> PipelineController<T> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_state(
            backend,
            T::Input::default(),
            T::Mode::default(),
            T::Params::default(),
        )
    }

    /// Build a controller around restored state and evaluate it once.
    pub fn with_state(
        backend: Arc<dyn Backend>,
        input: T::Input,
        mode: T::Mode,
        params: T::Params,
    ) -> Self {
        let state = PipelineState::<T>::new(input, mode, params);
        let (snapshots, _) = watch::channel(state.clone());
        let controller = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                backend,
                snapshots,
            }),
        };
        controller.transition(|_| {});
        controller
    }

    pub fn set_input(&self, value: T::Input) {
        self.transition(move |s| s.input = value);
    }

    /// Switch the operating mode.
    ///
    /// Input, output, and any auxiliary input fields are reset in the same
    /// transition, so no request for the old mode's input is issued afterwards.
    /// Setting the current mode again is a no-op.
    pub fn set_mode(&self, value: T::Mode) {
        let mut state = self.lock();
        if state.mode == value {
            return;
        }
        state.mode = value;
        state.input = T::Input::default();
        let call = Self::schedule(&mut state);
        self.publish(&state);
        drop(state);
        self.issue(call);
    }

    pub fn set_params(&self, value: T::Params) {
        self.transition(move |s| s.params = value);
    }

    /// Edit input and params together; schedules a single evaluation.
    pub fn edit(&self, f: impl FnOnce(&mut T::Input, &mut T::Params)) {
        self.transition(|s| f(&mut s.input, &mut s.params));
    }

    /// Re-evaluate the current state, e.g. to regenerate a generator's output.
    pub fn refresh(&self) {
        self.transition(|_| {});
    }

    pub fn current_output(&self) -> Output<T::Output> {
        self.lock().output.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn snapshot(&self) -> PipelineState<T> {
        self.lock().clone()
    }

    /// Register a change listener. The receiver sees every published snapshot,
    /// and never a result before it is committed.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState<T>> {
        self.shared.snapshots.subscribe()
    }

    /// Wait until the latest request has been reconciled and return the output.
    ///
    /// Never resolves if the backend never answers.
    pub async fn settled(&self) -> Output<T::Output> {
        let mut rx = self.subscribe();
        let output = match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.output.clone(),
            // The sender lives in `self`, so it cannot be dropped while we wait.
            Err(_) => self.current_output(),
        };
        output
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, f: impl FnOnce(&mut PipelineState<T>)) {
        let mut state = self.lock();
        f(&mut state);
        let call = Self::schedule(&mut state);
        self.publish(&state);
        drop(state);
        self.issue(call);
    }

    /// Start a new evaluation of the current state.
    ///
    /// The request id advances even when no call is made, so any response still
    /// in flight can no longer overwrite the `Empty` committed here.
    fn schedule(state: &mut PipelineState<T>) -> Option<PendingCall> {
        state.request_id += 1;
        if !T::should_invoke(&state.input, &state.params) {
            state.output = Output::Empty;
            state.loading = false;
            return None;
        }
        state.loading = true;
        Some(PendingCall {
            request_id: state.request_id,
            request: T::request(&state.input, state.mode, &state.params),
        })
    }

    fn publish(&self, state: &PipelineState<T>) {
        self.shared.snapshots.send_replace(state.clone());
    }

    fn issue(&self, call: Option<PendingCall>) {
        let Some(PendingCall {
            request_id,
            request,
        }) = call
        else {
            return;
        };
        tracing::debug!(
            route = T::ROUTE,
            request_id,
            operation = request.operation,
            "invoking operation"
        );
        let fut = self
            .shared
            .backend
            .invoke(request.operation, request.params);
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = fut.await;
            Self::commit(&shared, request_id, result);
        });
    }

    fn commit(shared: &Shared<T>, request_id: u64, result: InvokeResult) {
        let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.request_id != request_id {
            tracing::debug!(
                route = T::ROUTE,
                request_id,
                latest = state.request_id,
                "dropping stale result"
            );
            return;
        }
        state.output = match result {
            Ok(value) => match serde_json::from_value::<T::Output>(value) {
                Ok(v) => Output::Ready(v),
                Err(e) => Output::Failed(OperationError::new(format!(
                    "unexpected response shape: {e}"
                ))),
            },
            Err(e) => Output::Failed(e),
        };
        state.loading = false;
        shared.snapshots.send_replace(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::from_fn;
    use crate::model::Direction;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Reverses (encode) or uppercases (decode) text. Latency is chosen per call by the test.
    struct Reverse;

    impl Tool for Reverse {
        type Input = String;
        type Mode = Direction;
        type Params = ();
        type Output = String;
        const ROUTE: &'static str = "/test/reverse";

        fn should_invoke(input: &String, _: &()) -> bool {
            !input.is_empty()
        }

        fn request(input: &String, mode: Direction, _: &()) -> Request {
            let operation = match mode {
                Direction::Encode => "reverse",
                Direction::Decode => "upper",
            };
            Request {
                operation,
                params: json!({ "text": input }),
            }
        }
    }

    fn text_of(params: &Value) -> String {
        params["text"].as_str().unwrap_or_default().to_string()
    }

    /// Backend with per-input latency that records every call it receives.
    fn recording_backend(
        latency: fn(&str) -> u64,
    ) -> (Arc<dyn Backend>, Arc<StdMutex<Vec<(String, String)>>>) {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let seen = calls.clone();
        let backend = from_fn(move |operation: String, params: Value| {
            let text = text_of(&params);
            seen.lock().unwrap().push((operation.clone(), text.clone()));
            let delay = latency(&text);
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                match operation.as_str() {
                    "reverse" => Ok(json!(text.chars().rev().collect::<String>())),
                    "upper" => Ok(json!(text.to_uppercase())),
                    _ => Err(OperationError::new("unsupported")),
                }
            }
        });
        let backend: Arc<dyn Backend> = Arc::new(backend);
        (backend, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn slower_earlier_response_is_discarded() {
        let (backend, _) = recording_backend(|t| if t == "ab" { 100 } else { 0 });
        let controller = PipelineController::<Reverse>::new(backend);

        controller.set_input("ab".into());
        controller.set_input("abc".into());
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(controller.current_output(), Output::Ready("cba".into()));
        assert!(!controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn last_input_wins_for_any_completion_order() {
        // Earlier inputs answer later.
        let (backend, _) = recording_backend(|t| 100 - 10 * t.len() as u64);
        let controller = PipelineController::<Reverse>::new(backend);

        for s in ["a", "ab", "abc", "abcd", "abcde"] {
            controller.set_input(s.into());
        }
        let out = controller.settled().await;
        assert_eq!(out, Output::Ready("edcba".into()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.current_output(), Output::Ready("edcba".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_makes_no_call() {
        let (backend, calls) = recording_backend(|_| 0);
        let controller = PipelineController::<Reverse>::new(backend);

        controller.set_input(String::new());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(controller.current_output(), Output::Empty);
        assert!(!controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_input_invalidates_in_flight_request() {
        let (backend, _) = recording_backend(|_| 50);
        let controller = PipelineController::<Reverse>::new(backend);

        controller.set_input("xyz".into());
        assert!(controller.is_loading());
        controller.set_input(String::new());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(controller.current_output(), Output::Empty);
        assert!(!controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn mode_switch_resets_atomically() {
        let (backend, calls) = recording_backend(|_| 50);
        let controller = PipelineController::<Reverse>::new(backend);
        let mut rx = controller.subscribe();

        controller.set_input("abc".into());
        controller.set_mode(Direction::Decode);

        // The snapshot published by the switch is already fully reset.
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.mode, Direction::Decode);
        assert_eq!(snap.input, "");
        assert_eq!(snap.output, Output::Empty);
        assert!(!snap.loading);

        controller.set_input("xy".into());
        assert_eq!(controller.settled().await, Output::Ready("XY".into()));

        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("reverse".to_string(), "abc".to_string()),
                ("upper".to_string(), "xy".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn same_mode_is_a_no_op() {
        let (backend, calls) = recording_backend(|_| 0);
        let controller = PipelineController::<Reverse>::new(backend);
        controller.set_input("abc".into());
        controller.settled().await;

        controller.set_mode(Direction::Encode);
        assert_eq!(controller.snapshot().input, "abc");
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_becomes_output() {
        let backend = from_fn(|_: String, _: Value| async {
            Err(OperationError::new("decode base64 error: Invalid padding"))
        });
        let controller = PipelineController::<Reverse>::new(Arc::new(backend));
        controller.set_input("==".into());

        let out = controller.settled().await;
        assert_eq!(
            out.error().map(|e| e.message()),
            Some("decode base64 error: Invalid padding")
        );
        assert!(!controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn mistyped_response_fails_instead_of_panicking() {
        let backend = from_fn(|_: String, _: Value| async { Ok(json!({"not": "a string"})) });
        let controller = PipelineController::<Reverse>::new(Arc::new(backend));
        controller.set_input("a".into());

        let out = controller.settled().await;
        assert!(out
            .error()
            .is_some_and(|e| e.message().starts_with("unexpected response shape")));
    }

    #[tokio::test(start_paused = true)]
    async fn restored_state_is_evaluated_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let backend = from_fn(move |_: String, params: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!(text_of(&params).chars().rev().collect::<String>())) }
        });
        let controller = PipelineController::<Reverse>::with_state(
            Arc::new(backend),
            "hello".into(),
            Direction::Encode,
            (),
        );

        assert_eq!(controller.settled().await, Output::Ready("olleh".into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        controller.refresh();
        controller.settled().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_observe_commit_after_loading() {
        let (backend, _) = recording_backend(|_| 20);
        let controller = PipelineController::<Reverse>::new(backend);
        let mut rx = controller.subscribe();

        controller.set_input("ab".into());
        {
            let snap = rx.borrow_and_update();
            assert!(snap.loading);
            assert_eq!(snap.output, Output::Empty);
        }

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert!(!snap.loading);
        assert_eq!(snap.output, Output::Ready("ba".into()));
        assert_eq!(snap.request_id, controller.snapshot().request_id);
    }
}
