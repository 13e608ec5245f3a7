use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StoreError};

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default location under the user's data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("overlay_pomodoro")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let serialized = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        // Write then rename so a crash mid-save never leaves a torn snapshot.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_and_reads_json() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("state"));
        let value = serde_json::json!({ "currentSession": 2, "mode": "work" });
        store.set("pomodoroTimer", &value).await.expect("set");
        let loaded = store.get("pomodoroTimer").await.expect("get").expect("value");
        assert_eq!(value, loaded);
        assert!(dir.path().join("state/pomodoroTimer.json").exists());
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(store.get("pomodoroTimer").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn overwrites_previous_value() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("k", &serde_json::json!(1)).await.expect("set");
        store.set("k", &serde_json::json!(2)).await.expect("set");
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn corrupt_file_is_parse_error() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("pomodoroTimer.json"), b"{not json").unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let err = store.get("pomodoroTimer").await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        for key in ["", "..", "a/b", "a\\b"] {
            let err = store.set(key, &serde_json::json!({})).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)));
        }
    }
}
