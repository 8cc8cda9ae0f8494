//! Authenticated API client
//!
//! Every request goes through the same pipeline:
//!
//! ```text
//! ApiRequest
//!     → prepare (default timeout, cache-busting param on GET, bearer token)
//!     → send
//!     → 2xx: returned to the caller
//!     → no response: retried with exponential backoff
//!     → 401: one coordinated token refresh, then replayed with the new token
//!     → 5xx: retried with linear backoff
//!     → anything else: logged and surfaced
//! ```

use crate::access::{PermissionSet, role_from_token};
use crate::config::{ClientConfig, Surface};
use crate::cookies::PersistentCookies;
use crate::error::{ClientError, RefreshError, ResponseDetails};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::request::ApiRequest;
use crate::retry::{Attempts, Disposition, RetryPolicy};
use crate::session::{ExpiryReason, SessionEvent, SessionEvents};
use crate::store::{CredentialStore, MemoryStore, TokenStore};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    token: Option<String>,
}

/// An attempt that did not produce a 2xx response
enum Failure {
    Network(reqwest::Error),
    Status(Response),
}

struct Inner {
    http: Client,
    config: ClientConfig,
    base_url: String,
    tokens: TokenStore,
    cookies: Arc<PersistentCookies>,
    policy: RetryPolicy,
    refresh: RefreshCoordinator,
    events: SessionEvents,
}

/// Salon API client
///
/// Cloning is cheap; clones share the token store, the refresh state and the
/// session event channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client with default configuration and in-memory credentials
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Get the effective configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the stored access token and role
    pub fn token_store(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Get the cookie jar shared with the credential store
    pub fn cookies(&self) -> &PersistentCookies {
        &self.inner.cookies
    }

    /// Receive [`SessionEvent`]s emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Permissions carried by the stored access token
    pub fn permissions(&self) -> PermissionSet {
        self.inner
            .tokens
            .access_token()
            .map(|token| PermissionSet::from_token(&token))
            .unwrap_or_default()
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.inner.base_url, path)
        }
    }

    fn prepare(&self, request: &ApiRequest, url: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let config = &self.inner.config;

        let mut headers = request.headers.clone();
        if let Some(token) = bearer {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => debug!("Stored token is not a valid header value, sending unauthenticated"),
            }
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .headers(headers)
            .timeout(request.timeout.unwrap_or_else(|| config.default_timeout()));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if request.method == Method::GET {
            builder = builder.query(&[(config.cache_bust_param.as_str(), Utc::now().timestamp_millis())]);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
    }

    /// Send a request, recovering from expired tokens and transient failures
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let url = self.url(&request.path);
        let mut attempts = Attempts {
            auth_retried: !request.refresh_on_unauthorized,
            ..Attempts::default()
        };
        let mut refreshed: Option<String> = None;

        loop {
            let bearer = refreshed.clone().or_else(|| self.inner.tokens.access_token());
            debug!(method = %request.method, url = %url, authenticated = bearer.is_some(), "Sending request");

            let failure = match self.prepare(&request, &url, bearer.as_deref()).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => Failure::Status(response),
                // The request could not even be built; there is nothing to resend
                Err(e) if e.is_builder() => return Err(e.into()),
                Err(e) => Failure::Network(e),
            };

            let disposition = match &failure {
                Failure::Network(_) => self.inner.policy.on_network_error(&mut attempts),
                Failure::Status(response) => self
                    .inner
                    .policy
                    .on_status(response.status().as_u16(), &mut attempts),
            };

            match disposition {
                Disposition::Retry(delay) => {
                    match &failure {
                        Failure::Network(e) => {
                            warn!(method = %request.method, url = %url, error = %e, delay = ?delay, "No response, retrying");
                        }
                        Failure::Status(response) => {
                            warn!(method = %request.method, url = %url, status = response.status().as_u16(), delay = ?delay, "Server error, retrying");
                        }
                    }
                    drop(failure);
                    tokio::time::sleep(delay).await;
                }
                Disposition::Refresh => {
                    drop(failure);
                    debug!(method = %request.method, url = %url, "Unauthorized, refreshing token");
                    refreshed = Some(self.refresh_token().await?);
                }
                Disposition::Surface => return Err(self.surface(&request, &url, failure).await),
            }
        }
    }

    async fn surface(&self, request: &ApiRequest, url: &str, failure: Failure) -> ClientError {
        match failure {
            Failure::Network(e) => {
                warn!(method = %request.method, url = %url, error = %e, "Request failed without a response");
                e.into()
            }
            Failure::Status(response) => {
                let status = response.status().as_u16();
                let payload = response.text().await.unwrap_or_default();
                let details = ResponseDetails {
                    method: request.method.to_string(),
                    url: url.to_string(),
                    status,
                    payload,
                    timestamp: Utc::now(),
                };
                warn!(
                    method = %details.method,
                    url = %details.url,
                    status = details.status,
                    payload = %details.payload,
                    timestamp = %details.timestamp,
                    "API request failed"
                );
                ClientError::from_status(details)
            }
        }
    }

    /// Send a request and decode the JSON response
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            Ok(serde_json::from_value(serde_json::Value::Null)?)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    /// GET `path` and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::get(path)).await
    }

    /// POST `body` as JSON to `path` and decode the response
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    /// PUT `body` as JSON to `path` and decode the response
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    /// PATCH `body` as JSON to `path` and decode the response
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    /// DELETE `path` and decode the response; an empty body decodes as `null`
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Obtain a new access token, joining a refresh that is already running
    pub async fn refresh_token(&self) -> Result<String, ClientError> {
        Ok(self.inner.refresh.run(|| self.perform_refresh()).await?)
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let config = &self.inner.config;
        let url = self.url(&config.refresh_path);
        debug!(url = %url, "Requesting new access token");

        let outcome = match self
            .inner
            .http
            .post(&url)
            .timeout(config.refresh_timeout())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response
                .json::<RefreshResponse>()
                .await
                .ok()
                .and_then(|body| body.token)
                .filter(|token| !token.is_empty())
                .ok_or(RefreshError::MissingToken),
            Ok(response) => Err(RefreshError::Rejected {
                status: response.status().as_u16(),
            }),
            Err(e) => Err(RefreshError::Transport(e.to_string())),
        };

        let outcome = outcome.and_then(|token| self.store_refreshed(token));
        if let Err(e) = &outcome {
            self.expire_session(e);
        }
        outcome
    }

    fn store_refreshed(&self, token: String) -> RefreshOutcome {
        let tokens = &self.inner.tokens;
        tokens
            .set_access_token(&token)
            .map_err(|e| RefreshError::Storage(e.to_string()))?;

        if let Some(role) = role_from_token(&token) {
            if let Err(e) = tokens.set_role(&role) {
                warn!(error = %e, "Failed to persist role from refreshed token");
            }
        }

        info!("Access token refreshed");
        self.inner.events.emit(SessionEvent::Refreshed);
        Ok(token)
    }

    fn expire_session(&self, error: &RefreshError) {
        let (reason, login_route) = match error {
            RefreshError::MissingToken => (ExpiryReason::MissingToken, Surface::Admin.login_route()),
            _ => (
                ExpiryReason::RefreshFailed,
                self.inner.config.surface.login_route(),
            ),
        };

        warn!(error = %error, login_route, "Token refresh failed, session expired");
        if let Err(e) = self.inner.tokens.remove_access_token() {
            warn!(error = %e, "Failed to delete stored access token");
        }
        self.inner.events.emit(SessionEvent::Expired {
            reason,
            login_route,
        });
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("surface", &self.inner.config.surface)
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    surface: Option<Surface>,
}

impl ApiClientBuilder {
    /// Start from a loaded configuration; later setters override it
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential store; in-memory when unset
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the default request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub const fn surface(mut self, surface: Surface) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout.as_secs().max(1);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(surface) = self.surface {
            config.surface = surface;
        }
        config
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn CredentialStore>);
        let cookies = Arc::new(PersistentCookies::load(
            store.clone(),
            config.storage.cookie_key.clone(),
        ));
        let tokens = TokenStore::new(
            store,
            config.storage.token_key.clone(),
            config.storage.role_key.clone(),
        );

        // Cookies always travel with requests; the refresh endpoint depends on them
        let http = ClientBuilder::new()
            .cookie_provider(cookies.clone())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                base_url: config.normalized_base_url().to_string(),
                policy: RetryPolicy::from_config(&config.retry),
                tokens,
                cookies,
                refresh: RefreshCoordinator::new(),
                events: SessionEvents::new(),
                config,
            }),
        })
    }
}
