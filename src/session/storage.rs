use crate::error::StoreError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Durable key/value storage, grouped by namespace.
///
/// `set` only stages a value; `save` flushes a namespace and may fail on its own.
pub trait Storage: Send + Sync + 'static {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;
    fn save(&self, namespace: &str) -> Result<(), StoreError>;
}

/// One JSON document per namespace, stored as `<dir>/<namespace>.json`.
///
/// Documents are read once and cached; later reads are served from memory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    docs: Mutex<HashMap<String, Map<String, Value>>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            docs: Mutex::new(HashMap::new()),
        }
    }

    /// Platform data directory, e.g. `~/.local/share/devkit` on Linux.
    pub fn default_dir() -> Result<PathBuf, StoreError> {
        dirs::data_dir()
            .map(|d| d.join("devkit"))
            .ok_or_else(|| StoreError::Unavailable("no data directory on this platform".into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    fn docs(&self) -> MutexGuard<'_, HashMap<String, Map<String, Value>>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_doc(&self, namespace: &str) -> Result<Map<String, Value>, StoreError> {
        let path = self.path_for(namespace);
        // Covers a missing file as well as a data directory that cannot exist yet.
        if !path.is_file() {
            return Ok(Map::new());
        }
        let bytes = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Unavailable(format!(
                "{} is not a JSON object",
                path.display()
            ))),
        }
    }

    /// Run `f` against the cached document for `namespace`, loading it first if needed.
    fn with_doc<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> Result<R, StoreError> {
        let mut docs = self.docs();
        if !docs.contains_key(namespace) {
            let doc = self.read_doc(namespace)?;
            docs.insert(namespace.to_string(), doc);
        }
        let doc = docs
            .get_mut(namespace)
            .ok_or_else(|| StoreError::Unavailable(format!("namespace {namespace} not loaded")))?;
        Ok(f(doc))
    }
}

impl Storage for FileStorage {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_doc(namespace, |doc| doc.get(key).cloned())
    }

    /// Stage `value`. A corrupt document is replaced by a fresh one, so the next
    /// `save` repairs the file instead of failing forever.
    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut docs = self.docs();
        if !docs.contains_key(namespace) {
            let doc = match self.read_doc(namespace) {
                Ok(doc) => doc,
                Err(e @ (StoreError::Json(_) | StoreError::Unavailable(_))) => {
                    tracing::warn!(namespace, error = %e, "discarding corrupt document");
                    Map::new()
                }
                Err(e) => return Err(e),
            };
            docs.insert(namespace.to_string(), doc);
        }
        docs.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn save(&self, namespace: &str) -> Result<(), StoreError> {
        let bytes = self.with_doc(namespace, |doc| serde_json::to_vec_pretty(doc))??;
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        // Write to a sibling temp file and rename so a crash never leaves a torn document.
        let path = self.path_for(namespace);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_is_invisible_to_a_new_process_until_saved() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("session", "/codec/url", json!({"input": "a b"})).unwrap();
        assert_eq!(
            storage.get("session", "/codec/url").unwrap(),
            Some(json!({"input": "a b"}))
        );

        let restarted = FileStorage::new(dir.path());
        assert_eq!(restarted.get("session", "/codec/url").unwrap(), None);

        storage.save("session").unwrap();
        let restarted = FileStorage::new(dir.path());
        assert_eq!(
            restarted.get("session", "/codec/url").unwrap(),
            Some(json!({"input": "a b"}))
        );
    }

    #[test]
    fn namespaces_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("store", "settings", json!({"x": 1})).unwrap();
        storage.save("store").unwrap();

        assert!(dir.path().join("store.json").exists());
        assert!(!dir.path().join("session.json").exists());
        assert_eq!(storage.get("session", "settings").unwrap(), None);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session.json"), b"[1, 2").unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.get("session", "/text/regex").is_err());
    }

    #[test]
    fn set_replaces_a_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("store.json"), b"{\"settings\": tru").unwrap();
        let storage = FileStorage::new(dir.path());

        storage.set("store", "settings", json!({"x": 1})).unwrap();
        storage.save("store").unwrap();

        let restarted = FileStorage::new(dir.path());
        assert_eq!(
            restarted.get("store", "settings").unwrap(),
            Some(json!({"x": 1}))
        );
    }

    #[test]
    fn directory_under_a_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let storage = FileStorage::new(blocker.join("nested"));
        assert_eq!(storage.get("session", "k").unwrap(), None);
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let storage = FileStorage::new(blocker.join("nested"));
        storage.set("session", "k", json!(1)).unwrap();
        assert!(matches!(storage.save("session"), Err(StoreError::Io { .. })));
        // The staged value is still served.
        assert_eq!(storage.get("session", "k").unwrap(), Some(json!(1)));
    }
}
