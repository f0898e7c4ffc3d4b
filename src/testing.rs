//! Test support
//!
//! In-memory mock of the session store for deterministic tests with no
//! filesystem dependency.

#![allow(clippy::missing_errors_doc)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ApiError;
use crate::session::{Session, SessionStore};
use crate::types::UserProfile;

/// In-memory session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Session>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a token pair
    #[must_use]
    pub fn with_tokens(access_token: &str, refresh_token: Option<&str>) -> Self {
        let store = Self::new();
        // Mutex poisoning is acceptable in test mocks: a panicking test fails
        // anyway.
        let mut session = store.session.lock().unwrap();
        session.access_token = Some(access_token.to_string());
        session.refresh_token = refresh_token.map(String::from);
        drop(session);
        store
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), ApiError> {
        let mut session = self.session.lock().unwrap();
        session.access_token = Some(access_token);
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn set_user(&self, user: UserProfile) -> Result<(), ApiError> {
        let mut session = self.session.lock().unwrap();
        session.user = Some(user);
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ApiError> {
        *self.session.lock().unwrap() = Session::default();
        Ok(())
    }
}
