//! Per-route session store.
//!
//! Every tool page gets a private bag of state keyed by its route. When the
//! entry is persisted, the stored value is loaded synchronously on open and
//! every write is mirrored to durable storage by a background writer. The
//! in-memory value is authoritative; storage failures are logged and ignored.

mod storage;

pub use storage::{FileStorage, Storage};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

/// Storage namespace holding session entries; the route is the key.
pub const SESSION_NAMESPACE: &str = "session";

enum WriteCommand {
    Save { route: Arc<str>, value: Value },
    Flush(oneshot::Sender<()>),
}

/// Factory for [`SessionEntry`] values sharing one durable storage.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    writer: mpsc::UnboundedSender<WriteCommand>,
}

impl SessionStore {
    /// Create a store and spawn its writer task. Must be called within a Tokio runtime.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(storage.clone(), rx));
        Self { storage, writer }
    }

    /// Construct or resume the entry for `route`.
    ///
    /// With `persist`, a previously saved value replaces `initial`; a missing,
    /// unreadable, or mistyped stored value falls back to `initial`. Without
    /// `persist`, `initial` is used as-is and nothing reaches storage.
    ///
    /// The entry is ready as soon as this returns.
    pub fn open<V>(&self, route: &str, initial: V, persist: bool) -> SessionEntry<V>
    where
        V: Clone + Serialize + DeserializeOwned + Send + 'static,
    {
        let value = if persist {
            self.load(route).unwrap_or(initial)
        } else {
            initial
        };
        tracing::debug!(route, persist, "session entry opened");
        SessionEntry {
            route: Arc::from(route),
            value: Arc::new(Mutex::new(value)),
            writer: persist.then(|| self.writer.clone()),
        }
    }

    /// Resolve once every write issued before this call has been saved or has failed.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn load<V: DeserializeOwned>(&self, route: &str) -> Option<V> {
        let stored = match self.storage.get(SESSION_NAMESPACE, route) {
            Ok(v) => v?,
            Err(e) => {
                tracing::warn!(route, error = %e, "failed to load session entry");
                return None;
            }
        };
        match serde_json::from_value(stored) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(route, error = %e, "discarding stored session entry of unexpected shape");
                None
            }
        }
    }
}

/// Applies saves in issue order. Ends once the store and all entries are dropped.
async fn run_writer(storage: Arc<dyn Storage>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriteCommand::Save { route, value } => {
                let storage = storage.clone();
                let key = route.clone();
                let res = tokio::task::spawn_blocking(move || {
                    storage.set(SESSION_NAMESPACE, &key, value)?;
                    storage.save(SESSION_NAMESPACE)
                })
                .await;
                match res {
                    Ok(Ok(())) => tracing::trace!(route = %route, "session entry saved"),
                    Ok(Err(e)) => {
                        tracing::warn!(route = %route, error = %e, "failed to save session entry")
                    }
                    Err(e) => {
                        tracing::warn!(route = %route, error = %e, "session save task failed")
                    }
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Handle to one route's state. Clones share the same value.
pub struct SessionEntry<V> {
    route: Arc<str>,
    value: Arc<Mutex<V>>,
    writer: Option<mpsc::UnboundedSender<WriteCommand>>,
}

impl<V> Clone for SessionEntry<V> {
    fn clone(&self) -> Self {
        Self {
            route: self.route.clone(),
            value: self.value.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<V> SessionEntry<V>
where
    V: Clone + Serialize,
{
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn is_persisted(&self) -> bool {
        self.writer.is_some()
    }

    pub fn read(&self) -> V {
        self.lock().clone()
    }

    /// Replace the whole value.
    pub fn write(&self, value: V) {
        self.update(move |v| *v = value);
    }

    /// Mutate the value in place and mirror the result to storage if persisted.
    pub fn update(&self, f: impl FnOnce(&mut V)) {
        let mut value = self.lock();
        f(&mut value);
        let Some(writer) = &self.writer else {
            return;
        };
        // Serialized under the lock so saves are queued in mutation order.
        match serde_json::to_value(&*value) {
            Ok(json) => {
                let cmd = WriteCommand::Save {
                    route: self.route.clone(),
                    value: json,
                };
                if writer.send(cmd).is_err() {
                    tracing::warn!(route = %self.route, "session writer stopped; keeping value in memory");
                }
            }
            Err(e) => {
                tracing::warn!(route = %self.route, error = %e, "failed to serialize session entry")
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, V> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
