//! File-backed key-value store
//!
//! One JSON file per key under a root directory - the persisted-log analog
//! of per-user browser storage. Keys are sanitized into safe file names.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use pulseline_core::error::{RealtimeError, Result};
use pulseline_core::traits::KeyValueStore;

/// Key-value store writing each entry to `<root>/<key>.json`
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RealtimeError::storage(format!(
                "failed to read '{key}': {err}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RealtimeError::storage(format!("failed to create store root: {e}")))?;
        fs::write(self.path_for(key), value)
            .await
            .map_err(|e| RealtimeError::storage(format!("failed to write '{key}': {e}")))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RealtimeError::storage(format!(
                "failed to remove '{key}': {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> FileKeyValueStore {
        let dir = std::env::temp_dir().join(format!("pulseline-kv-{}", uuid::Uuid::now_v7()));
        FileKeyValueStore::new(dir)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = scratch_store();
        assert_eq!(store.get("pulseline.notifications.1").await.unwrap(), None);

        store.set("pulseline.notifications.1", "[]").await.unwrap();
        assert_eq!(
            store.get("pulseline.notifications.1").await.unwrap().as_deref(),
            Some("[]")
        );

        store.remove("pulseline.notifications.1").await.unwrap();
        assert_eq!(store.get("pulseline.notifications.1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_removing_a_missing_key_is_fine() {
        let store = scratch_store();
        store.remove("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_sanitized_into_file_names() {
        let store = scratch_store();
        store.set("weird/key with spaces", "x").await.unwrap();
        assert_eq!(
            store.get("weird/key with spaces").await.unwrap().as_deref(),
            Some("x")
        );
        assert!(store.path_for("weird/key with spaces").ends_with("weird_key_with_spaces.json"));
    }
}
