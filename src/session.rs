use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Error;
use crate::users::dto::User;

/// Fixed key under which the authenticated user is persisted.
pub const STORAGE_KEY: &str = "ecoaction-auth-user";

/// Local persistence for the authenticated user: one JSON blob, written on
/// login/sign-up, deleted on logout, read once at startup. The password is
/// stripped before the blob is written; a stored session never contains one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<User>, Error>;
    async fn save(&self, user: &User) -> Result<(), Error>;
    async fn clear(&self) -> Result<(), Error>;
}

/// File-backed session store keeping the blob under a configured directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(format!("{STORAGE_KEY}.json")),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<User>, Error> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                // A corrupt blob means a logged-out state, not a hard failure.
                warn!(path = %self.path.display(), error = %e, "discarding unreadable session");
                Ok(None)
            }
        }
    }

    async fn save(&self, user: &User) -> Result<(), Error> {
        let safe = user.clone().without_password();
        let raw = serde_json::to_string(&safe)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;
        }
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        debug!(user_id = %safe.id, "session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }
}

/// In-memory session store for tests and ephemeral setups.
#[derive(Default)]
pub struct MemorySessionStore {
    user: Mutex<Option<User>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<User>> {
        self.user.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<User>, Error> {
        Ok(self.lock().clone())
    }

    async fn save(&self, user: &User) -> Result<(), Error> {
        *self.lock() = Some(user.clone().without_password());
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use crate::users::dto::UserStats;

    fn user_with_password() -> User {
        User {
            id: "u1".into(),
            name: "Amina".into(),
            email: "amina@example.com".into(),
            password: Some("hunter2secret".into()),
            stats: UserStats {
                completed_missions: 3,
            },
        }
    }

    fn temp_store() -> FileSessionStore {
        let dir = std::env::temp_dir().join(format!(
            "ecoaction-session-test-{}",
            time::OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        FileSessionStore::new(dir)
    }

    #[tokio::test]
    async fn save_strips_password_and_round_trips() {
        let store = temp_store();
        store.save(&user_with_password()).await.unwrap();
        let loaded = store.load().await.unwrap().expect("session present");
        assert_eq!(loaded.id, "u1");
        assert_eq!(loaded.email, "amina@example.com");
        assert!(loaded.password.is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn load_is_none_before_first_save_and_after_clear() {
        let store = temp_store();
        assert!(store.load().await.unwrap().is_none());
        store.save(&user_with_password()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_strips_password_too() {
        let store = MemorySessionStore::new();
        store.save(&user_with_password()).await.unwrap();
        let loaded = store.load().await.unwrap().expect("session present");
        assert!(loaded.password.is_none());
    }
}
