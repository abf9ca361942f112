//! Client-side session storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use super::ClientError;
use crate::db::UserResponse;

/// Token and user kept after login or registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserResponse,
}

/// Storage for the current session. All operations are synchronous.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<StoredSession>;
    fn save(&self, session: &StoredSession) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: Mutex<Option<StoredSession>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<StoredSession> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| ClientError::Storage("session lock poisoned".to_string()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| ClientError::Storage("session lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// Session kept as a JSON file, used by the CLI between invocations
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.leadgen/session.json`, or the working directory without a home
    pub fn default_location() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".leadgen").join("session.json"))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<StoredSession> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Storage(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(session).map_err(|e| ClientError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ClientError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> StoredSession {
        StoredSession {
            token: "jwt".to_string(),
            user: UserResponse {
                id: "u1".to_string(),
                name: "Erika".to_string(),
                email: "erika@example.de".to_string(),
                role: "vertrieb".to_string(),
                salutation: Some("frau".to_string()),
                company: None,
                company_url: None,
                phone: None,
                department: None,
                position: None,
                last_login_at: None,
                created_at: "2024-01-01 00:00:00".to_string(),
            },
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::default();
        assert!(store.load().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap().token, "jwt");
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load(), Some(session()));

        store.clear().unwrap();
        assert!(!store.path().exists());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileTokenStore::new(path).load().is_none());
    }
}
