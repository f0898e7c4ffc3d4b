//! HTTP request execution
//!
//! Performs one API call with the current access token attached, classifies
//! the response, and on an expired token hands off to the
//! [`RefreshCoordinator`] before retrying the original request exactly once.
//!
//! The credential-exchange endpoints (login, register, refresh, logout) never
//! trigger a refresh: a 401 there is an ordinary HTTP failure, which also
//! keeps a failed `/auth/refresh` call from recursing into another refresh.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionStore;
use crate::types::{RefreshRequest, RefreshResponse};

/// Endpoints that exchange credentials and therefore never refresh-and-retry
const CREDENTIAL_ENDPOINTS: [&str; 4] =
    ["/auth/login", "/auth/register", "/auth/refresh", "/auth/logout"];

fn is_credential_endpoint(endpoint: &str) -> bool {
    CREDENTIAL_ENDPOINTS.contains(&endpoint)
}

/// One outbound API call
///
/// Immutable once issued; a retry reuses the same descriptor and only the
/// Authorization header differs, because the token is re-read from the
/// session store on every send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub endpoint: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self { method, endpoint: endpoint.into(), headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    #[must_use]
    pub fn post(endpoint: impl Into<String>, body: serde_json::Value) -> Self {
        Self { body: Some(body), ..Self::new(Method::POST, endpoint) }
    }

    #[must_use]
    pub fn put(endpoint: impl Into<String>, body: serde_json::Value) -> Self {
        Self { body: Some(body), ..Self::new(Method::PUT, endpoint) }
    }

    #[must_use]
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }
}

/// Executes API calls with token attachment and retry-once-on-401
pub struct HttpExecutor {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn SessionStore>,
    coordinator: RefreshCoordinator,
}

impl HttpExecutor {
    /// Build an executor over the given configuration and session store
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the underlying HTTP client cannot be
    /// constructed
    pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        let coordinator = RefreshCoordinator::new(store.clone());
        Ok(Self { http, config, store, coordinator })
    }

    /// Execute a request, deserializing the response body
    ///
    /// An empty body (204 and friends) deserializes as JSON `null`, so `()`
    /// and `Option<T>` targets succeed.
    ///
    /// # Errors
    /// - [`ApiError::Network`] when no response was obtained
    /// - [`ApiError::Http`] for failure statuses other than a recoverable 401
    /// - [`ApiError::SessionExpired`] when a 401 could not be recovered
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
    ) -> Result<T, ApiError> {
        self.execute_with(request, true).await
    }

    /// Execution with an explicit refresh guard
    ///
    /// `allow_refresh` is cleared after a recovery cycle, bounding every
    /// original request to at most one refresh-and-retry.
    async fn execute_with<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
        mut allow_refresh: bool,
    ) -> Result<T, ApiError> {
        loop {
            let response = self.send(&request).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !is_credential_endpoint(&request.endpoint) {
                if allow_refresh {
                    debug!(endpoint = %request.endpoint, "401 received, refreshing token");
                    self.coordinator
                        .coordinate(|refresh_token| self.refresh_call(refresh_token))
                        .await
                        .map_err(|err| {
                            warn!(endpoint = %request.endpoint, error = %err, "refresh failed");
                            ApiError::SessionExpired
                        })?;
                    allow_refresh = false;
                    continue;
                }
                // Already retried once with a fresh token and still 401.
                return Err(ApiError::SessionExpired);
            }

            if !status.is_success() {
                return Err(Self::status_error(status, response).await);
            }

            return Self::parse_body(response).await;
        }
    }

    /// Perform one direct refresh attempt, bypassing the waiter queue
    ///
    /// # Errors
    /// Returns [`ApiError::RefreshFailed`] if no refresh token is stored or
    /// the refresh call fails; the session is cleared in either case
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        self.coordinator.refresh_once(|refresh_token| self.refresh_call(refresh_token)).await
    }

    /// The raw `POST /auth/refresh` call, driven by the coordinator
    ///
    /// Goes through [`Self::send`] like any other request, but classification
    /// is local: `/auth/refresh` is a credential endpoint, so a 401 here is a
    /// plain [`ApiError::Http`] and can never recurse into another refresh.
    async fn refresh_call(&self, refresh_token: String) -> Result<RefreshResponse, ApiError> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = OutboundRequest::post("/auth/refresh", body);

        let response = self.send(&request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }
        Self::parse_body(response).await
    }

    /// Issue the call with the current token attached
    ///
    /// The access token is re-read from the store on every send, which is how
    /// a retried request picks up the refreshed token.
    async fn send(&self, request: &OutboundRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.config.url_for(&request.endpoint);
        let mut builder =
            self.http.request(request.method.clone(), &url).headers(request.headers.clone());

        if let Some(token) = self.store.get().await.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            // Sets Content-Type: application/json alongside the payload.
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| ApiError::Network(e.to_string()))
    }

    /// Build an [`ApiError::Http`] from a failure response
    ///
    /// The message comes from the JSON body's `message` or `error` field,
    /// falling back to a generic status line.
    async fn status_error(status: StatusCode, response: reqwest::Response) -> ApiError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| {
                format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
            });

        ApiError::Http { status: status.as_u16(), message }
    }

    async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        if text.is_empty() {
            return serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| ApiError::Decode(format!("empty body: {e}")));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub(crate) fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}
