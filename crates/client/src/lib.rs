//! Salon API client
//!
//! An HTTP client for the salon booking backend that attaches the stored
//! bearer token to every request, renews it once per contention window when the
//! backend answers 401, and retries network failures and 5xx responses with
//! backoff. When a session cannot be renewed it is reported through
//! [`SessionEvent::Expired`] instead of being handled in place.

#[macro_use]
extern crate tracing;

pub mod access;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod refresh;
pub mod request;
pub mod retry;
pub mod services;
pub mod session;
pub mod store;

pub use access::{ClaimShape, PermissionSet, TokenClaims, decode_claims, role_from_token};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::{ClientConfig, ConfigError, RetryConfig, StorageConfig, Surface};
pub use cookies::PersistentCookies;
pub use error::{ClientError, RefreshError, ResponseDetails, StoreError};
pub use request::ApiRequest;
pub use reqwest::Method;
pub use session::{ExpiryReason, SessionEvent};
pub use store::{CredentialStore, FileStore, MemoryStore, TokenStore};
