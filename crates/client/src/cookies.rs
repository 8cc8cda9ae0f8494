//! Cookie jar that survives the process
//!
//! The refresh endpoint authenticates with a cookie set at login. Every
//! `Set-Cookie` the backend sends is kept in the [`CredentialStore`] under one
//! key, the latest per host and cookie name, and replayed into a fresh
//! [`Jar`] when a client is built, so a later process sends it back.

use crate::error::StoreError;
use crate::store::CredentialStore;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One `Set-Cookie` header and the URL that sent it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SavedCookie {
    url: String,
    set_cookie: String,
}

type SavedCookies = BTreeMap<String, SavedCookie>;

pub struct PersistentCookies {
    jar: RwLock<Jar>,
    store: Arc<dyn CredentialStore>,
    key: String,
}

impl PersistentCookies {
    /// Build a jar holding every cookie saved under `key`
    pub fn load(store: Arc<dyn CredentialStore>, key: impl Into<String>) -> Self {
        let cookies = Self {
            jar: RwLock::new(Jar::default()),
            store,
            key: key.into(),
        };

        let saved = cookies.saved();
        if !saved.is_empty() {
            debug!(count = saved.len(), "Restoring saved cookies");
        }
        {
            let jar = cookies.jar.read().unwrap_or_else(PoisonError::into_inner);
            for cookie in saved.values() {
                match Url::parse(&cookie.url) {
                    Ok(url) => jar.add_cookie_str(&cookie.set_cookie, &url),
                    Err(e) => debug!(error = %e, "Skipping saved cookie with invalid URL"),
                }
            }
        }
        cookies
    }

    /// Forget every cookie, in memory and in the store
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut jar = self.jar.write().map_err(|_| StoreError::Poisoned)?;
        *jar = Jar::default();
        self.store.remove(&self.key)
    }

    fn saved(&self) -> SavedCookies {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                debug!(error = %e, "Ignoring malformed cookie entry");
                SavedCookies::new()
            }),
            Ok(None) => SavedCookies::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read saved cookies");
                SavedCookies::new()
            }
        }
    }

    fn persist(&self, headers: &[&HeaderValue], url: &Url) -> Result<(), StoreError> {
        let mut saved = self.saved();
        let host = url.host_str().unwrap_or_default();

        for header in headers {
            let Ok(set_cookie) = header.to_str() else {
                continue;
            };
            let Some((name, _)) = set_cookie.split_once('=') else {
                continue;
            };
            saved.insert(
                format!("{host}|{}", name.trim()),
                SavedCookie {
                    url: url.to_string(),
                    set_cookie: set_cookie.to_string(),
                },
            );
        }

        self.store.set(&self.key, &serde_json::to_string(&saved)?)
    }
}

impl CookieStore for PersistentCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<&HeaderValue> = cookie_headers.collect();
        if headers.is_empty() {
            return;
        }

        // The write lock also serializes the read-modify-write of the stored map
        let jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        jar.set_cookies(&mut headers.iter().copied(), url);
        if let Err(e) = self.persist(&headers, url) {
            warn!(error = %e, "Failed to persist cookies");
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies(url)
    }
}

impl std::fmt::Debug for PersistentCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCookies")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
