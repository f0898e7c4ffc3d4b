//! PassVault API client
//!
//! Public surface over the executor, refresh coordinator, and session store.
//! One instance per application; cheap to share behind an `Arc`. Every
//! successful credential exchange updates the injected session store, and
//! application code reaches the rest of the API through the generic verb
//! helpers, which all follow the full retry-on-401 path.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpExecutor, OutboundRequest};
use crate::session::{Session, SessionStore};
use crate::types::{
    AuthResponse, LoginRequest, RegisterRequest, UserProfile, VerifyMasterRequest,
};

/// Authenticated client for the PassVault API
pub struct PassVaultClient {
    executor: HttpExecutor,
}

impl PassVaultClient {
    /// Create a client with the given configuration and session store
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built
    pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        Ok(Self { executor: HttpExecutor::new(config, store)? })
    }

    /// Create a builder for fluent configuration
    #[must_use]
    pub fn builder() -> PassVaultClientBuilder {
        PassVaultClientBuilder::default()
    }

    /// Log in with username and password
    ///
    /// Stores the returned token pair and profile, overwriting any prior
    /// session.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejected credentials; login never
    /// triggers a refresh-retry
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, ApiError> {
        let body = LoginRequest { username: username.to_string(), password: password.to_string() };
        let response: AuthResponse = self
            .executor
            .execute(OutboundRequest::post(
                "/auth/login",
                serde_json::to_value(&body).map_err(|e| ApiError::Decode(e.to_string()))?,
            ))
            .await?;

        let user = self.store_credentials(response).await?;
        info!(username = %user.username, "logged in");
        Ok(user)
    }

    /// Register a new account
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] if registration is rejected
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .executor
            .execute(OutboundRequest::post(
                "/auth/register",
                serde_json::to_value(&body).map_err(|e| ApiError::Decode(e.to_string()))?,
            ))
            .await?;

        let user = self.store_credentials(response).await?;
        info!(username = %user.username, "registered");
        Ok(user)
    }

    /// Log out
    ///
    /// Notifies the server best-effort, then clears the local session
    /// unconditionally: local state consistency takes priority over server
    /// acknowledgment, so a failed server call is swallowed. Calling this
    /// while already logged out is a no-op.
    ///
    /// # Errors
    /// Returns [`ApiError::Storage`] only if clearing the local session fails
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result: Result<serde_json::Value, ApiError> = self
            .executor
            .execute(OutboundRequest::post("/auth/logout", serde_json::json!({})))
            .await;
        if let Err(err) = result {
            warn!(error = %err, "server logout failed, clearing local session anyway");
        }

        self.executor.store().clear().await?;
        info!("logged out");
        Ok(())
    }

    /// Manually refresh the access token
    ///
    /// A direct attempt that bypasses the waiter queue, mirroring the
    /// original request flow only in its session updates.
    ///
    /// # Errors
    /// Returns [`ApiError::RefreshFailed`] if no refresh token is stored or
    /// the refresh endpoint rejects it; the session is cleared on failure
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.executor.refresh_access_token().await.map(|_| ())
    }

    /// Fetch the authenticated user's profile (`GET /auth/me`)
    ///
    /// # Errors
    /// Returns [`ApiError::SessionExpired`] if the session cannot be
    /// recovered via refresh
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.executor.execute(OutboundRequest::get("/auth/me")).await
    }

    /// Verify the vault master password (`POST /auth/verify-master`)
    ///
    /// The response shape is server-defined, so the raw JSON value is
    /// returned.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] if verification is rejected
    pub async fn verify_master_password(
        &self,
        master_password: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let body = VerifyMasterRequest { master_password: master_password.to_string() };
        self.executor
            .execute(OutboundRequest::post(
                "/auth/verify-master",
                serde_json::to_value(&body).map_err(|e| ApiError::Decode(e.to_string()))?,
            ))
            .await
    }

    /// Execute a GET request against any API endpoint
    ///
    /// # Errors
    /// Returns error if the request fails or the response cannot be
    /// deserialized
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.executor.execute(OutboundRequest::get(endpoint)).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    /// Returns error if the request fails or the response cannot be
    /// deserialized
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.executor.execute(OutboundRequest::post(endpoint, body)).await
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    /// Returns error if the request fails or the response cannot be
    /// deserialized
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.executor.execute(OutboundRequest::put(endpoint, body)).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    /// Returns error if the request fails or the response cannot be
    /// deserialized
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.executor.execute(OutboundRequest::delete(endpoint)).await
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.executor.store().get().await
    }

    /// Whether an access token is currently stored
    pub async fn is_authenticated(&self) -> bool {
        self.executor.store().is_authenticated().await
    }

    async fn store_credentials(&self, response: AuthResponse) -> Result<UserProfile, ApiError> {
        let user = UserProfile::from(&response);
        let store = self.executor.store();
        store.set_tokens(response.access_token, Some(response.refresh_token)).await?;
        store.set_user(user.clone()).await?;
        Ok(user)
    }
}

/// Builder for [`PassVaultClient`]
#[derive(Default)]
pub struct PassVaultClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn SessionStore>>,
}

impl PassVaultClientBuilder {
    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session store
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns error if the session store is missing or client creation fails
    pub fn build(self) -> Result<PassVaultClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let store =
            self.store.ok_or_else(|| ApiError::Config("session store not set".to_string()))?;
        PassVaultClient::new(config, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySessionStore;

    #[test]
    fn test_builder_pattern() {
        let store = Arc::new(MemorySessionStore::new());
        let client = PassVaultClient::builder().store(store).build();
        assert!(client.is_ok());
    }

    #[test]
    fn test_builder_missing_store() {
        let result = PassVaultClient::builder().build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_session_snapshot_reflects_store() {
        let store = Arc::new(MemorySessionStore::with_tokens("A1", Some("R1")));
        let client =
            PassVaultClient::new(ClientConfig::default(), store).expect("client should build");

        assert!(client.is_authenticated().await);
        assert_eq!(client.session().await.access_token.as_deref(), Some("A1"));
    }
}
