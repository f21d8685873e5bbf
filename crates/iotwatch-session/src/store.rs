//! Durable storage for the session token.
//!
//! The session layer only needs a tiny key/value interface, expressed by
//! the [`CredentialStore`] trait. Two implementations ship with the crate:
//!
//! - [`MemoryCredentialStore`]: process-local, for tests and ephemeral use
//! - [`FileCredentialStore`]: a small JSON file, written atomically

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::StoreError;

/// Key/value storage that survives process restarts.
///
/// Only the session layer writes to it. Every method may fail; callers
/// decide whether a failure matters (a failed read at startup is treated
/// as "no token", a failed delete during logout is only logged).
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

/// An in-memory [`CredentialStore`].
///
/// Clones share the same map, so a test can keep one clone and inspect
/// what the session layer wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `key = value`.
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        Self {
            values: Arc::new(Mutex::new(values)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        async move { Ok(self.values.lock().await.get(key).cloned()) }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            self.values
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            self.values.lock().await.remove(key);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// A [`CredentialStore`] backed by one JSON object in a file.
///
/// Writes go to a sibling temp file which is then renamed over the
/// original, so a crash mid-write never leaves a truncated store. On Unix
/// the file is created with mode `0600`.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Uses `path` as the backing file. It is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<config dir>/iotwatch/credentials.json`, when the platform has a
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("iotwatch").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let text = serde_json::to_string_pretty(values)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        // A leftover from a crashed write may carry looser permissions;
        // the token must only ever land in a file created private.
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }

        let mut file = private_file_options().open(&tmp).await?;
        file.write_all(text.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        async move {
            let _guard = self.lock.lock().await;
            Ok(self.read_all().await?.remove(key))
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            let _guard = self.lock.lock().await;
            let mut values = self.read_all().await?;
            values.insert(key.to_string(), value.to_string());
            self.write_all(&values).await
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            let _guard = self.lock.lock().await;
            let mut values = self.read_all().await?;
            if values.remove(key).is_some() {
                self.write_all(&values).await?;
            }
            Ok(())
        }
    }
}

/// Options for a fresh temp file, readable only by its owner on Unix.
fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_delete() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get("authToken").await.unwrap(), None);

        store.set("authToken", "T").await.unwrap();
        assert_eq!(store.get("authToken").await.unwrap().as_deref(), Some("T"));

        store.delete("authToken").await.unwrap();
        assert_eq!(store.get("authToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_values() {
        let store = MemoryCredentialStore::new();
        let observer = store.clone();
        store.set("authToken", "T").await.unwrap();
        assert_eq!(observer.get("authToken").await.unwrap().as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        assert_eq!(store.get("authToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        FileCredentialStore::new(&path).set("authToken", "T").await.unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.get("authToken").await.unwrap().as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_file_store_delete_removes_only_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        store.set("authToken", "T").await.unwrap();
        store.set("other", "x").await.unwrap();

        store.delete("authToken").await.unwrap();

        assert_eq!(store.get("authToken").await.unwrap(), None);
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_file_store_delete_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        assert!(store.delete("authToken").await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = FileCredentialStore::new(&path).get("authToken").await;

        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileCredentialStore::new(&path).set("authToken", "T").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_stale_temp_file_never_holds_token_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, "{}").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileCredentialStore::new(&path);
        store.set("authToken", "T").await.unwrap();
        store.set("authToken", "U").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
        assert_eq!(store.get("authToken").await.unwrap().as_deref(), Some("U"));
    }
}
