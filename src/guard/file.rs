//! File-backed duplicate guard.
//!
//! The set lives in memory and is written out once at shutdown, so
//! durability holds across clean restarts only. A corrupt or missing file
//! starts the bot with an empty cache instead of failing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::ProcessedStore;

pub struct FileStore {
    path: PathBuf,
    keys: RwLock<HashSet<String>>,
}

impl FileStore {
    /// Load the persisted set, falling back to empty on any read or parse
    /// problem.
    pub fn load(path: &Path) -> Self {
        let keys = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(keys) => {
                    debug!(count = keys.len(), path = %path.display(), "loaded processed set");
                    keys.into_iter().collect()
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt processed set, starting empty");
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };

        Self {
            path: path.to_path_buf(),
            keys: RwLock::new(keys),
        }
    }
}

#[async_trait]
impl ProcessedStore for FileStore {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.keys.read().await.contains(key))
    }

    async fn mark_processed(&self, key: &str) -> anyhow::Result<()> {
        self.keys.write().await.insert(key.to_string());
        Ok(())
    }

    async fn unmark(&self, key: &str) -> anyhow::Result<()> {
        self.keys.write().await.remove(key);
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let keys = self.keys.read().await;
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&sorted)?)?;
        debug!(count = sorted.len(), path = %self.path.display(), "flushed processed set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_flush_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");

        let store = FileStore::load(&path);
        store.mark_processed("2k4ha1").await.unwrap();
        store
            .mark_processed("https://streamable.com/abc123")
            .await
            .unwrap();
        store.flush().await.unwrap();

        let reloaded = FileStore::load(&path);
        assert!(reloaded.is_processed("2k4ha1").await.unwrap());
        assert!(reloaded
            .is_processed("https://streamable.com/abc123")
            .await
            .unwrap());
        assert!(!reloaded.is_processed("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::load(&path);
        assert!(!store.is_processed("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_unmark_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(&dir.path().join("processed.json"));

        store.mark_processed("2k4ha1").await.unwrap();
        assert!(store.is_processed("2k4ha1").await.unwrap());
        store.unmark("2k4ha1").await.unwrap();
        assert!(!store.is_processed("2k4ha1").await.unwrap());
    }
}
