//! Persisted credentials
//!
//! A string-keyed store holding the access token and the role derived from it.
//! The token is written JSON-encoded (`"abc"` is stored as `"\"abc\""`) so values
//! written by the browser client and by this crate are interchangeable.

use crate::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Key/value storage for credentials
pub trait CredentialStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Credential store backed by a JSON object on disk
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;

        // Owner read/write only; the file holds bearer tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        f(&mut entries);
        self.save(&entries)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// Typed access to the token and role entries of a [`CredentialStore`]
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<dyn CredentialStore>,
    token_key: String,
    role_key: String,
}

impl TokenStore {
    pub fn new(
        inner: Arc<dyn CredentialStore>,
        token_key: impl Into<String>,
        role_key: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            token_key: token_key.into(),
            role_key: role_key.into(),
        }
    }

    /// Current access token.
    ///
    /// Absent, unreadable and malformed entries all read as `None`; the request then
    /// goes out without an `Authorization` header.
    pub fn access_token(&self) -> Option<String> {
        let raw = match self.inner.get(&self.token_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                return None;
            }
        };

        match serde_json::from_str::<String>(&raw) {
            Ok(token) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed access token entry");
                None
            }
        }
    }

    /// Persist a new access token
    pub fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(token)?;
        self.inner.set(&self.token_key, &encoded)
    }

    /// Stored role, if any
    pub fn role(&self) -> Option<String> {
        self.inner.get(&self.role_key).ok().flatten()
    }

    pub fn set_role(&self, role: &str) -> Result<(), StoreError> {
        self.inner.set(&self.role_key, role)
    }

    /// Forget the access token only
    pub fn remove_access_token(&self) -> Result<(), StoreError> {
        self.inner.remove(&self.token_key)
    }

    /// Forget token and role
    pub fn clear(&self) -> Result<(), StoreError> {
        self.inner.remove(&self.token_key)?;
        self.inner.remove(&self.role_key)
    }

    /// The raw store underneath
    pub fn backend(&self) -> &Arc<dyn CredentialStore> {
        &self.inner
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("token_key", &self.token_key)
            .field("role_key", &self.role_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_tokens() -> (Arc<MemoryStore>, TokenStore) {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(store.clone(), "token", "role");
        (store, tokens)
    }

    #[test]
    fn test_token_is_double_encoded() {
        let (store, tokens) = memory_tokens();
        tokens.set_access_token("abc").unwrap();

        assert_eq!(store.get("token").unwrap().as_deref(), Some("\"abc\""));
        assert_eq!(tokens.access_token().as_deref(), Some("abc"));
    }

    #[test]
    fn test_malformed_token_reads_as_absent() {
        let (store, tokens) = memory_tokens();
        store.set("token", "abc").unwrap();
        assert_eq!(tokens.access_token(), None);

        store.set("token", "\"\"").unwrap();
        assert_eq!(tokens.access_token(), None);
    }

    #[test]
    fn test_clear_removes_token_and_role() {
        let (_, tokens) = memory_tokens();
        tokens.set_access_token("abc").unwrap();
        tokens.set_role("ADMIN").unwrap();
        assert_eq!(tokens.role().as_deref(), Some("ADMIN"));

        tokens.clear().unwrap();
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.role(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get("token").unwrap(), None);
        store.set("token", "\"abc\"").unwrap();
        store.set("role", "STAFF").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("\"abc\""));
        assert_eq!(reopened.get("role").unwrap().as_deref(), Some("STAFF"));

        reopened.remove("token").unwrap();
        reopened.remove("missing").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::new(&path);
        store.set("token", "\"abc\"").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get("token"), Err(StoreError::Serialization(_))));
    }
}
