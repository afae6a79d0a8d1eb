//! Durable session storage for login resumption.
//!
//! A successful login yields a `token` and `playerId`; they are the sole
//! session-resumption mechanism, persisted through a [`SessionStore`] and
//! replayed as an automatic login on the next (re)connect.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneLinkError};

/// Resumption material captured from a successful login reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSession {
    pub player_id: String,
    pub token: String,
}

/// Storage backend for [`StoredSession`].
///
/// Implementations decide durability: files, a keychain, or memory for
/// tests. Stores are shared with the background connection task, so
/// methods take `&self`.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any.
    fn load(&self) -> Result<Option<StoredSession>>;

    /// Persist `session`, replacing any previous one.
    fn store(&self, session: &StoredSession) -> Result<()>;

    /// Remove the stored session. Ok even when nothing was stored.
    fn clear(&self) -> Result<()>;
}

/// Non-durable in-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.inner.lock().map_err(poisoned)?.clone())
    }

    fn store(&self, session: &StoredSession) -> Result<()> {
        *self.inner.lock().map_err(poisoned)? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SceneLinkError {
    SceneLinkError::StorageError("session store lock poisoned".to_string())
}

/// JSON-file-backed store; the durable default for desktop clients.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SceneLinkError::StorageError(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        let session = serde_json::from_str(&raw).map_err(|e| {
            SceneLinkError::StorageError(format!(
                "corrupt session file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(session))
    }

    fn store(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SceneLinkError::StorageError(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw).map_err(|e| {
            SceneLinkError::StorageError(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SceneLinkError::StorageError(format!(
                "failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredSession {
        StoredSession {
            player_id: "p42".to_string(),
            token: "tok_abc".to_string(),
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.store(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "scene_link_session_{}_{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let store = FileSessionStore::new(&path);

        assert_eq!(store.load().unwrap(), None);
        store.store(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        // Overwrite.
        let other = StoredSession {
            player_id: "p43".to_string(),
            token: "tok_def".to_string(),
        };
        store.store(&other).unwrap();
        assert_eq!(store.load().unwrap(), Some(other));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "scene_link_corrupt_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "not json").unwrap();
        let store = FileSessionStore::new(&path);
        assert!(store.load().is_err());
        std::fs::remove_file(&path).ok();
    }
}
