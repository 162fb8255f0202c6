//! Durable key-value storage.
//!
//! Two scopes mirror a browser extension's storage areas: synced user
//! preferences and local extension data. The local scope is the single
//! source of truth for whether a multi-page job is in flight.

use crate::config::Preferences;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Stored template list
pub const TEMPLATES_KEY: &str = "templates";
/// In-flight multi-page continuation record
pub const MULTI_PAGE_STATE_KEY: &str = "rl_multiPageState";
/// Formatted output waiting for a clipboard write
pub const PENDING_AUTO_COPY_KEY: &str = "pendingAutoCopy";

const EXPORT_MODE_KEY: &str = "exportMode";
const CLEAN_URLS_KEY: &str = "cleanUrls";
const IGNORE_NESTED_KEY: &str = "ignoreNestedAnchors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// User preferences
    Sync,
    /// Extension data: templates, job state, pending copies
    Local,
}

impl Scope {
    fn file_name(&self) -> &'static str {
        match self {
            Scope::Sync => "sync.json",
            Scope::Local => "local.json",
        }
    }
}

/// Async key-value store
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>>;

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, scope: Scope, key: &str) -> Result<()>;
}

/// Reads and deserializes a record; a missing key is `None`
pub async fn load<T: DeserializeOwned, S: Store + ?Sized>(
    store: &S,
    scope: Scope,
    key: &str,
) -> Result<Option<T>> {
    match store.get(scope, key).await? {
        Some(Value::Null) | None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// Serializes and writes a record
pub async fn save<T: Serialize + ?Sized, S: Store + ?Sized>(
    store: &S,
    scope: Scope,
    key: &str,
    value: &T,
) -> Result<()> {
    store.set(scope, key, serde_json::to_value(value)?).await
}

/// Reads the synced preference record, defaulting absent fields
pub async fn load_preferences<S: Store + ?Sized>(store: &S) -> Result<Preferences> {
    let mut record = Map::new();
    for key in [EXPORT_MODE_KEY, CLEAN_URLS_KEY, IGNORE_NESTED_KEY] {
        if let Some(value) = store.get(Scope::Sync, key).await? {
            record.insert(key.to_string(), value);
        }
    }
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Writes each preference field under its own sync key
pub async fn save_preferences<S: Store + ?Sized>(store: &S, prefs: &Preferences) -> Result<()> {
    if let Value::Object(record) = serde_json::to_value(prefs)? {
        for (key, value) in record {
            store.set(Scope::Sync, &key, value).await?;
        }
    }
    Ok(())
}

/// In-process store, used by tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<(Scope, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().await.get(&(scope, key.to_string())).cloned())
    }

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        self.data
            .lock()
            .await
            .insert((scope, key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        self.data.lock().await.remove(&(scope, key.to_string()));
        Ok(())
    }
}

/// One JSON object per scope in a directory, surviving process restarts
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn path(&self, scope: Scope) -> PathBuf {
        self.dir.join(scope.file_name())
    }

    async fn read_scope(&self, scope: Scope) -> Result<Map<String, Value>> {
        let path = self.path(scope);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Map::new()),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => Ok(map),
                other => {
                    ::log::warn!(
                        "Ignoring non-object store file {}: {}",
                        path.display(),
                        other
                    );
                    Ok(Map::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_scope(&self, scope: Scope, map: Map<String, Value>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let contents = serde_json::to_string_pretty(&Value::Object(map))?;
        let path = self.path(scope);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_scope(scope).await?.remove(key))
    }

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_scope(scope).await?;
        map.insert(key.to_string(), value);
        self.write_scope(scope, map).await
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_scope(scope).await?;
        if map.remove(key).is_some() {
            self.write_scope(scope, map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::ExportMode;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "region-links-{}-{}-{}",
            name,
            std::process::id(),
            crate::utils::now_millis()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_memory_store_scopes_are_separate() {
        let store = MemoryStore::new();
        store.set(Scope::Local, "k", json!(1)).await.unwrap();
        assert_eq!(store.get(Scope::Local, "k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get(Scope::Sync, "k").await.unwrap(), None);

        store.remove(Scope::Local, "k").await.unwrap();
        assert_eq!(store.get(Scope::Local, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_file_store_persists_across_instances() {
        let dir = temp_dir("persist");
        {
            let store = JsonFileStore::new(&dir);
            store
                .set(Scope::Local, MULTI_PAGE_STATE_KEY, json!({"currentPage": 2}))
                .await
                .unwrap();
            store.set(Scope::Sync, "cleanUrls", json!(true)).await.unwrap();
        }

        let reopened = JsonFileStore::new(&dir);
        assert_eq!(
            reopened
                .get(Scope::Local, MULTI_PAGE_STATE_KEY)
                .await
                .unwrap(),
            Some(json!({"currentPage": 2}))
        );
        assert!(dir.join("sync.json").exists());

        reopened
            .remove(Scope::Local, MULTI_PAGE_STATE_KEY)
            .await
            .unwrap();
        assert_eq!(
            reopened
                .get(Scope::Local, MULTI_PAGE_STATE_KEY)
                .await
                .unwrap(),
            None
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_store_file_reads_empty() {
        let store = JsonFileStore::new(temp_dir("missing"));
        assert_eq!(store.get(Scope::Local, TEMPLATES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_preferences_round_trip_through_sync_keys() {
        let store = MemoryStore::new();
        assert_eq!(load_preferences(&store).await.unwrap(), Preferences::default());

        let prefs = Preferences {
            export_mode: ExportMode::Csv,
            clean_urls: true,
            ignore_nested_anchors: false,
        };
        save_preferences(&store, &prefs).await.unwrap();
        assert_eq!(
            store.get(Scope::Sync, "exportMode").await.unwrap(),
            Some(json!("csv"))
        );
        assert_eq!(load_preferences(&store).await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_typed_load_treats_null_as_absent() {
        let store = MemoryStore::new();
        store.set(Scope::Local, "x", Value::Null).await.unwrap();
        let loaded: Option<Vec<String>> = load(&store, Scope::Local, "x").await.unwrap();
        assert_eq!(loaded, None);
    }
}
