//! Authenticated HTTP client for the PassVault API.
//!
//! Sits between application code and the PassVault server: attaches the
//! current access token to every outgoing request, detects token expiry,
//! transparently obtains a new access token exactly once even when many
//! requests expire concurrently, replays the requests that triggered the
//! refresh, and uniformly surfaces failure when refresh itself cannot
//! succeed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  PassVaultClient │  Public surface (login, logout, verbs)
//! └────────┬─────────┘
//!          │
//!          └──► HttpExecutor          (send, classify, retry-once)
//!                    │
//!                    ├──► RefreshCoordinator  (single-flight refresh)
//!                    └──► SessionStore        (durable token + profile state)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use passvault_client::{ClientConfig, FileSessionStore, PassVaultClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileSessionStore::new("~/.passvault/session.json")?);
//!     let client = PassVaultClient::new(ClientConfig::from_env(), store)?;
//!
//!     let user = client.login("alice", "correct horse battery staple").await?;
//!     println!("logged in as {}", user.username);
//!
//!     // Any 401 on this call triggers one shared refresh and one retry.
//!     let entries: serde_json::Value = client.get("/vault/entries").await?;
//!     println!("{entries}");
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod refresh;
pub mod session;
pub mod testing;
pub mod types;

// Re-export the types most callers need
pub use client::{PassVaultClient, PassVaultClientBuilder};
pub use config::ClientConfig;
pub use error::{ApiError, ApiErrorCategory};
pub use http::OutboundRequest;
pub use refresh::RefreshCoordinator;
pub use session::{FileSessionStore, Session, SessionStore};
pub use types::{AuthResponse, RefreshResponse, UserProfile};
