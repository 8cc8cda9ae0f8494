//! Shared fixtures for client integration tests

#![allow(dead_code)]

use jsonwebtoken::{EncodingKey, Header, encode};
use salon_client::{ApiClient, ClientConfig, CredentialStore, MemoryStore, Surface};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const REFRESH_PATH: &str = "/api/v1/auth/refresh-token";

/// Configuration with millisecond backoff so retry tests stay fast
pub fn fast_config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base_url);
    config.retry.network_base_ms = 5;
    config.retry.server_step_ms = 5;
    config
}

/// Route client logs through the test harness; `RUST_LOG=salon_client=debug` shows them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub client: ApiClient,
    pub store: Arc<MemoryStore>,
}

pub fn harness(base_url: &str, token: Option<&str>) -> Harness {
    harness_with(fast_config(base_url), token)
}

pub fn harness_with(config: ClientConfig, token: Option<&str>) -> Harness {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let client = ApiClient::builder()
        .config(config)
        .store(store.clone())
        .build()
        .unwrap();
    if let Some(token) = token {
        client.token_store().set_access_token(token).unwrap();
    }
    Harness { client, store }
}

pub fn admin_harness(base_url: &str, token: Option<&str>) -> Harness {
    let mut config = fast_config(base_url);
    config.surface = Surface::Admin;
    harness_with(config, token)
}

/// Raw value stored under the token key
pub fn raw_token(store: &MemoryStore) -> Option<String> {
    store.get("token").unwrap()
}

/// HS256 token carrying the given claims
pub fn mint(claims: &serde_json::Value) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
}

pub fn mint_with_role(role: &str) -> String {
    mint(&json!({
        "sub": "42",
        "role": role,
        "exp": chrono::Utc::now().timestamp() + 3600,
    }))
}

/// Address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
