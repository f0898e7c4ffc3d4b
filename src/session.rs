//! Session state and durable storage
//!
//! The session holds the current token pair and minimal user profile. Storage
//! is abstracted behind [`SessionStore`] so the HTTP layer can be tested with
//! an in-memory store while applications use the file-backed provider that
//! survives process restarts.
//!
//! The session is mutated only by credential exchanges (login, register,
//! refresh) and by logout or terminal refresh failure, which clear it.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiError;
use crate::types::UserProfile;

/// Current authentication state
///
/// An access token being present is what makes the caller authenticated; a
/// missing refresh token means refresh is impossible and must fail fast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,

    /// When the session was last written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the caller is considered authenticated
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Storage seam for the session
///
/// Pure state holder: no network and no refresh logic. Implementations must
/// be safe for concurrent use from multiple in-flight requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot of the current session
    async fn get(&self) -> Session;

    /// Store a new token pair
    ///
    /// The access token is persisted unconditionally; the refresh token only
    /// if provided, since refresh responses may omit rotation.
    ///
    /// # Errors
    /// Returns error if persistence fails
    async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), ApiError>;

    /// Store the user profile
    ///
    /// # Errors
    /// Returns error if persistence fails
    async fn set_user(&self, user: UserProfile) -> Result<(), ApiError>;

    /// Remove all session fields
    ///
    /// # Errors
    /// Returns error if persistence fails
    async fn clear(&self) -> Result<(), ApiError>;

    /// Whether an access token is currently stored
    async fn is_authenticated(&self) -> bool {
        self.get().await.is_authenticated()
    }
}

/// File-backed session store
///
/// Keeps the session in memory and writes every mutation through to a JSON
/// file, so a restarted process picks up where it left off. The file is
/// loaded once at construction.
pub struct FileSessionStore {
    path: PathBuf,
    cache: RwLock<Session>,
}

impl FileSessionStore {
    /// Open a session store backed by the given file
    ///
    /// A missing file yields an empty session; an unreadable or corrupt file
    /// is an error rather than silently discarded credentials.
    ///
    /// # Errors
    /// Returns [`ApiError::Storage`] if the file exists but cannot be read or
    /// parsed
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let path = path.into();
        let session = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ApiError::Storage(format!("corrupt session file: {e}")))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Session::default(),
            Err(e) => return Err(ApiError::Storage(format!("failed to read session file: {e}"))),
        };

        debug!(path = %path.display(), authenticated = session.is_authenticated(), "session store opened");
        Ok(Self { path, cache: RwLock::new(session) })
    }

    // Non-blocking writes: persistence happens with the cache write guard
    // held, so a slow disk must not stall the runtime worker.
    async fn persist(&self, session: &Session) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Storage(format!("failed to create session dir: {e}")))?;
        }

        let raw = serde_json::to_string_pretty(session)
            .map_err(|e| ApiError::Storage(format!("failed to serialize session: {e}")))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| ApiError::Storage(format!("failed to write session file: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self) -> Session {
        self.cache.read().await.clone()
    }

    async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), ApiError> {
        let mut session = self.cache.write().await;
        session.access_token = Some(access_token);
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }
        session.updated_at = Some(Utc::now());
        self.persist(&session).await
    }

    async fn set_user(&self, user: UserProfile) -> Result<(), ApiError> {
        let mut session = self.cache.write().await;
        session.user = Some(user);
        session.updated_at = Some(Utc::now());
        self.persist(&session).await
    }

    async fn clear(&self) -> Result<(), ApiError> {
        let mut session = self.cache.write().await;
        *session = Session::default();
        debug!("session cleared");
        self.persist(&session).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for session state and the file-backed store.
    use super::*;

    fn temp_session_path() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        (dir, path)
    }

    #[test]
    fn test_session_authentication_invariant() {
        let mut session = Session::default();
        assert!(!session.is_authenticated());

        session.access_token = Some("A1".into());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_store_starts_empty() {
        let (_dir, path) = temp_session_path();
        let store = FileSessionStore::new(&path).unwrap();

        let session = store.get().await;
        assert!(session.access_token.is_none());
        assert!(session.refresh_token.is_none());
        assert!(session.user.is_none());
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_tokens_survive_reopen() {
        let (_dir, path) = temp_session_path();

        {
            let store = FileSessionStore::new(&path).unwrap();
            store.set_tokens("A1".into(), Some("R1".into())).await.unwrap();
            store.set_user(UserProfile { username: "alice".into() }).await.unwrap();
        }

        // A fresh store over the same file sees the persisted session
        let store = FileSessionStore::new(&path).unwrap();
        let session = store.get().await;
        assert_eq!(session.access_token.as_deref(), Some("A1"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.user.as_ref().map(|u| u.username.as_str()), Some("alice"));
        assert!(session.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_token_kept_when_rotation_omitted() {
        let (_dir, path) = temp_session_path();
        let store = FileSessionStore::new(&path).unwrap();

        store.set_tokens("A1".into(), Some("R1".into())).await.unwrap();
        // Refresh without rotation: access token replaced, refresh token kept
        store.set_tokens("A2".into(), None).await.unwrap();

        let session = store.get().await;
        assert_eq!(session.access_token.as_deref(), Some("A2"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (_dir, path) = temp_session_path();
        let store = FileSessionStore::new(&path).unwrap();

        store.set_tokens("A1".into(), Some("R1".into())).await.unwrap();
        store.set_user(UserProfile { username: "alice".into() }).await.unwrap();
        store.clear().await.unwrap();

        let session = store.get().await;
        assert!(session.access_token.is_none());
        assert!(session.refresh_token.is_none());
        assert!(session.user.is_none());

        // Clearing an already-empty session is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_persist_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("auth").join("session.json");

        let store = FileSessionStore::new(&path).unwrap();
        store.set_tokens("A1".into(), Some("R1".into())).await.unwrap();

        let reopened = FileSessionStore::new(&path).unwrap();
        assert_eq!(reopened.get().await.access_token.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (_dir, path) = temp_session_path();
        std::fs::write(&path, "not json").unwrap();

        let result = FileSessionStore::new(&path);
        assert!(matches!(result, Err(ApiError::Storage(_))));
    }
}
