use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::Config;

pub const DEFAULT_STORE_FILE: &str = "store.json";

/// A key-value backend holding JSON documents.
///
/// Backends report failures; [`Storage`] decides which of them are
/// swallowed.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
    fn describe(&self) -> String;
}

/// Which backend to open; decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    File(PathBuf),
    Memory,
    Browser,
}

impl StoreBackend {
    #[tracing::instrument(skip(cfg, data_dir))]
    pub fn from_config(cfg: &Config, data_dir: &Path) -> anyhow::Result<Self> {
        let file_name = cfg
            .get("storage.file")
            .unwrap_or_else(|| DEFAULT_STORE_FILE.to_string());
        let requested = cfg.get("storage.backend");

        let backend = match requested.as_deref().map(str::trim) {
            None | Some("") if cfg!(target_arch = "wasm32") => StoreBackend::Browser,
            None | Some("") | Some("file") => StoreBackend::File(data_dir.join(file_name)),
            Some("memory") => StoreBackend::Memory,
            Some("browser") if cfg!(target_arch = "wasm32") => StoreBackend::Browser,
            Some("browser") => {
                warn!("browser storage is only available in the web build; using the file store");
                StoreBackend::File(data_dir.join(file_name))
            }
            Some(other) => return Err(anyhow!("invalid storage.backend setting: {other}")),
        };

        debug!(?backend, "selected storage backend");
        Ok(backend)
    }

    pub fn open(&self) -> anyhow::Result<Box<dyn KeyValueStore>> {
        match self {
            StoreBackend::File(path) => Ok(Box::new(FileStore::open(path)?)),
            StoreBackend::Memory => Ok(Box::new(MemoryStore::default())),
            #[cfg(target_arch = "wasm32")]
            StoreBackend::Browser => Ok(Box::new(browser::BrowserStore::open()?)),
            #[cfg(not(target_arch = "wasm32"))]
            StoreBackend::Browser => Err(anyhow!("browser storage requires the web build")),
        }
    }
}

/// Persistence adapter handed to the state container.
pub struct Storage {
    backend: Box<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    #[tracing::instrument]
    pub fn open(backend: &StoreBackend) -> anyhow::Result<Self> {
        let store = backend.open()?;
        info!(store = %store.describe(), "opened storage");
        Ok(Self::new(store))
    }

    /// Raw lookup; missing keys and read failures both yield `default`.
    #[tracing::instrument(skip(self, default))]
    pub fn get_value(&self, key: &str, default: Value) -> Value {
        match self.backend.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(key, error = %format!("{err:#}"), "storage read failed; using default");
                default
            }
        }
    }

    /// Typed lookup; a stored value of the wrong shape also yields `default`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_value(key, Value::Null) {
            Value::Null => default,
            value => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(key, error = %err, "stored value has unexpected shape; using default");
                default
            }),
        }
    }

    #[tracing::instrument(skip(self, value))]
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> anyhow::Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize value for {key}"))?;
        self.backend
            .write(key, value)
            .with_context(|| format!("failed to write {key} to {}", self.backend.describe()))
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, key: &str) -> anyhow::Result<()> {
        self.backend
            .remove(key)
            .with_context(|| format!("failed to delete {key} from {}", self.backend.describe()))
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}

/// One JSON object on disk, every key a top-level member.
#[derive(Debug)]
pub struct FileStore {
    pub path: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let path = path.to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        info!(file = %path.display(), exists = path.exists(), "opened file store");
        Ok(Self { path })
    }

    fn load_entries(&self) -> anyhow::Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?
        {
            Value::Object(entries) => Ok(entries),
            other => Err(anyhow!(
                "{} holds a JSON {} instead of an object",
                self.path.display(),
                json_kind(&other)
            )),
        }
    }

    /// Like `load_entries`, but a damaged file is treated as empty so the
    /// next write replaces it.
    fn load_entries_for_write(&self) -> Map<String, Value> {
        self.load_entries().unwrap_or_else(|err| {
            warn!(file = %self.path.display(), error = %format!("{err:#}"), "discarding unreadable store contents");
            Map::new()
        })
    }

    fn save_entries(&self, entries: &Map<String, Value>) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), keys = entries.len(), "saving store atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, entries)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let mut entries = self.load_entries()?;
        Ok(entries.remove(key))
    }

    #[tracing::instrument(skip(self, value))]
    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut entries = self.load_entries_for_write();
        entries.insert(key.to_string(), value);
        self.save_entries(&entries)
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.load_entries_for_write();
        if entries.remove(key).is_some() {
            self.save_entries(&entries)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file store at {}", self.path.display())
    }
}

/// Process-local store keeping serialized strings, the way browser
/// storage does. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Stores raw text under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, raw: &str) {
        self.entries.lock().insert(key.to_string(), raw.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .map(|raw| {
                serde_json::from_str(raw).with_context(|| format!("failed parsing stored {key}"))
            })
            .transpose()
    }

    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&value)?;
        self.entries.lock().insert(key.to_string(), serialized);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use anyhow::{Context, anyhow};
    use serde_json::Value;

    use super::KeyValueStore;

    /// `window.localStorage`, for the web build.
    pub struct BrowserStore {
        storage: web_sys::Storage,
    }

    impl BrowserStore {
        pub fn open() -> anyhow::Result<Self> {
            let storage = web_sys::window()
                .and_then(|window| window.local_storage().ok().flatten())
                .ok_or_else(|| anyhow!("local storage is unavailable"))?;
            Ok(Self { storage })
        }
    }

    impl KeyValueStore for BrowserStore {
        fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
            let raw = self
                .storage
                .get_item(key)
                .map_err(|err| anyhow!("local storage read failed: {err:?}"))?;
            raw.map(|text| {
                serde_json::from_str(&text).with_context(|| format!("failed parsing stored {key}"))
            })
            .transpose()
        }

        fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
            let serialized = serde_json::to_string(&value)?;
            self.storage
                .set_item(key, &serialized)
                .map_err(|err| anyhow!("local storage write failed: {err:?}"))
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.storage
                .remove_item(key)
                .map_err(|err| anyhow!("local storage delete failed: {err:?}"))
        }

        fn describe(&self) -> String {
            "browser local storage".to_string()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::{FileStore, KeyValueStore, MemoryStore, Storage};

    #[test]
    fn file_store_roundtrip_and_delete() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("store.json");
        let mut storage = Storage::new(Box::new(FileStore::open(&path).expect("open")));

        storage
            .set("windowState", &json!({"width": 1440, "isMaximized": false}))
            .expect("set window state");
        storage.set("autoLaunch", &true).expect("set flag");

        let reopened = Storage::new(Box::new(FileStore::open(&path).expect("reopen")));
        assert_eq!(reopened.get_value("windowState", json!(null))["width"], 1440);
        assert!(reopened.get("autoLaunch", false));

        storage.delete("autoLaunch").expect("delete");
        assert!(!reopened.get("autoLaunch", false));
        assert_eq!(reopened.get_value("windowState", json!(null))["isMaximized"], false);
    }

    #[test]
    fn corrupt_file_reads_as_default_and_is_replaced_on_write() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("store.json");
        std::fs::write(&path, "{ not json").expect("write garbage");

        let mut storage = Storage::new(Box::new(FileStore::open(&path).expect("open")));
        assert_eq!(storage.get_value("taskAidState", json!("fallback")), json!("fallback"));

        storage.set("taskAidState", &json!({"search": "x"})).expect("overwrite");
        assert_eq!(storage.get_value("taskAidState", json!(null))["search"], "x");
    }

    #[test]
    fn wrong_shape_yields_typed_default() {
        let store = MemoryStore::default();
        store.insert_raw("count", "\"seven\"");
        let storage = Storage::new(Box::new(store));
        assert_eq!(storage.get::<u32>("count", 3), 3);
        assert_eq!(storage.get::<u32>("missing", 4), 4);
    }

    #[test]
    fn memory_store_keeps_serialized_text() {
        let store = MemoryStore::default();
        let mut writer = store.clone();
        writer.write("k", json!({"a": [1, 2]})).expect("write");
        assert_eq!(store.raw("k").as_deref(), Some(r#"{"a":[1,2]}"#));

        store.insert_raw("broken", "{");
        assert!(store.read("broken").is_err());
        let storage = Storage::new(Box::new(store));
        assert_eq!(storage.get_value("broken", json!(0)), json!(0));
    }
}
