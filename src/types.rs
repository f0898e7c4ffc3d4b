//! Wire types for the PassVault API
//!
//! Request and response bodies exchanged with the auth endpoints. The server
//! speaks camelCase JSON, so every type carries a `rename_all` attribute
//! rather than renaming fields one by one.

use serde::{Deserialize, Serialize};

/// Body for `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body for `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body for `POST /auth/refresh`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body for `POST /auth/verify-master`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyMasterRequest {
    pub master_password: String,
}

/// Successful response from `POST /auth/login` and `POST /auth/register`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
}

/// Successful response from `POST /auth/refresh`
///
/// The refresh token is optional: the server only includes it when it rotates
/// the token, and callers must keep the previous one otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Minimal user profile kept alongside the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
}

impl From<&AuthResponse> for UserProfile {
    fn from(response: &AuthResponse) -> Self {
        Self { username: response.username.clone() }
    }
}
