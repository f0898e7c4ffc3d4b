//! Error types for PassVault API operations
//!
//! Classifies failures by how callers need to react to them: transport
//! failures, server-reported failures, and terminal session loss.

use thiserror::Error;

/// Categories of API errors for caller-side handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Transport failures - no response was obtained
    Network,
    /// Server returned a failure status
    Http,
    /// The session is gone; caller must re-authenticate
    Session,
    /// Local configuration or storage problems
    Local,
}

/// API operation errors
///
/// Payloads are plain strings rather than wrapped source errors so the type
/// stays `Clone`: refresh outcomes are broadcast to every queued waiter.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response was obtained from the server
    #[error("network error: {0}")]
    Network(String),

    /// Server returned a failure status other than a recoverable 401
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A 401 could not be recovered by refreshing; the local session has been
    /// cleared and subsequent calls run unauthenticated
    #[error("session expired")]
    SessionExpired,

    /// Token refresh could not be performed or failed
    #[error("token refresh failed: {reason}")]
    RefreshFailed { reason: String },

    /// Invalid client configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Session persistence failed
    #[error("session storage error: {0}")]
    Storage(String),

    /// A success response body could not be parsed as the declared type
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Http { .. } => ApiErrorCategory::Http,
            Self::SessionExpired | Self::RefreshFailed { .. } => ApiErrorCategory::Session,
            Self::Config(_) | Self::Storage(_) | Self::Decode(_) => ApiErrorCategory::Local,
        }
    }

    /// True when the caller should react by redirecting to a
    /// re-authentication flow
    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.category() == ApiErrorCategory::Session
    }

    /// HTTP status carried by this error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
