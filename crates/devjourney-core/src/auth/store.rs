use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keys of the persisted client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    AccessToken,
    User,
}

impl SessionKey {
    pub const ALL: [SessionKey; 2] = [SessionKey::AccessToken, SessionKey::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "accessToken",
            SessionKey::User => "user",
        }
    }
}

/// Synchronous string key-value storage for the session.
///
/// Each call is a single atomic access; there is no multi-key transaction.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Option<String>;
    fn set(&self, key: SessionKey, value: &str) -> Result<()>;
    fn remove(&self, key: SessionKey) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<SessionKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(&key).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(&key);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<DateTime<Utc>>,
}

/// Session persisted as JSON in the cache directory, written through on
/// every change so separate CLI runs share one session.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<SessionFile>,
}

impl FileStore {
    /// Open the session file in `cache_dir`, starting empty if absent
    pub fn open(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(SESSION_FILE);
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            serde_json::from_str(&contents).context("Failed to parse session file")?
        } else {
            SessionFile::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the session was last written
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at
    }

    fn persist(&self, state: &SessionFile) -> Result<()> {
        if state.values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove session file")?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.values.get(key.as_str()).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.values.insert(key.as_str().to_string(), value.to_string());
        state.updated_at = Some(Utc::now());
        self.persist(&state)
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.values.remove(key.as_str()).is_none() {
            return Ok(());
        }
        state.updated_at = Some(Utc::now());
        self.persist(&state)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(SessionKey::AccessToken), None);

        store.set(SessionKey::AccessToken, "tok").unwrap();
        assert_eq!(store.get(SessionKey::AccessToken).as_deref(), Some("tok"));
        assert_eq!(store.get(SessionKey::User), None);

        store.remove(SessionKey::AccessToken).unwrap();
        assert_eq!(store.get(SessionKey::AccessToken), None);
        // Removing a missing key is not an error
        store.remove(SessionKey::User).unwrap();
    }

    #[test]
    fn test_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.updated_at().is_none());
        store.set(SessionKey::AccessToken, "tok-1").unwrap();
        store.set(SessionKey::User, r#"{"username":"ada"}"#).unwrap();
        assert!(store.path().exists());
        assert!(store.updated_at().is_some());

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(SessionKey::AccessToken).as_deref(), Some("tok-1"));
        assert_eq!(
            reopened.get(SessionKey::User).as_deref(),
            Some(r#"{"username":"ada"}"#)
        );
    }

    #[test]
    fn test_file_store_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set(SessionKey::AccessToken, "tok").unwrap();
        assert!(store.path().exists());

        store.remove(SessionKey::AccessToken).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_uses_storage_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set(SessionKey::AccessToken, "tok").unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["values"]["accessToken"], "tok");
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        assert!(FileStore::open(dir.path()).is_err());
    }
}
