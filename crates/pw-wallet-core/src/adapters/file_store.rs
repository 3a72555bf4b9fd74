//! JSON-file key-value store for one device profile.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::WalletError;
use crate::ports::outbound::KeyValueStore;

/// File-backed key-value store for one device profile.
///
/// The whole map lives in memory and is rewritten as one JSON object on every
/// mutation, through a temp file and a rename so a crash leaves either the old
/// or the new file on disk.
pub struct FileKeyValueStore {
    data: Mutex<BTreeMap<String, String>>,
    path: PathBuf,
}

impl FileKeyValueStore {
    /// Open the store at `path`, loading existing content.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is an error
    /// so callers can fall back instead of overwriting it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) => {
                let data: BTreeMap<String, String> = serde_json::from_slice(&bytes)
                    .map_err(|e| {
                        WalletError::Storage(format!("corrupt store {}: {e}", path.display()))
                    })?;
                info!(
                    path = %path.display(),
                    keys = data.len(),
                    "[pw-wallet] Loaded device store"
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "[pw-wallet] No device store yet");
                BTreeMap::new()
            }
            Err(e) => {
                return Err(WalletError::Storage(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            data: Mutex::new(data),
            path,
        })
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), WalletError> {
        let io_err = |e: std::io::Error| {
            WalletError::Storage(format!("write {} failed: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let bytes = serde_json::to_vec(data)
            .map_err(|e| WalletError::Storage(format!("encode store: {e}")))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Apply `change` and write the result. The in-memory map is only updated
    /// when the write succeeds.
    fn mutate(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), WalletError> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        change(&mut next);
        if let Err(e) = self.persist(&next) {
            warn!(error = %e, "[pw-wallet] Device store write failed");
            return Err(e);
        }
        *data = next;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.mutate(|data| {
            data.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> Result<(), WalletError> {
        if !self.data.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|data| {
            data.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profile").join("wallet.json");

        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("pw:session", "{}").await.unwrap();
        store.set("pw:other", "x").await.unwrap();
        store.remove("pw:other").await.unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("pw:session").await.unwrap(),
            Some("{}".to_string())
        );
        assert_eq!(reopened.get("pw:other").await.unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            FileKeyValueStore::open(&path),
            Err(WalletError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        let store = FileKeyValueStore::open(blocker.join("wallet.json")).unwrap();
        // Parent becomes a regular file, so create_dir_all fails.
        std::fs::write(&blocker, b"").unwrap();

        assert!(store.set("k", "v").await.is_err());
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
