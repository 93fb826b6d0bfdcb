//! Session storage abstraction.
//!
//! The client keeps its session (the bearer token and whatever the embedding
//! application stores next to it) in a namespaced key-value store. Values are
//! JSON so a token can be stored either as a bare string or as an object
//! such as `{"access_token": "..."}`.
//!
//! Two backends ship with the crate: [`MemorySessionStore`] for tests and
//! short-lived processes, and [`FileSessionStore`], which persists one JSON
//! object per namespace in a single file.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, TaskLinkError};

/// Key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "token";

/// Namespace used when the caller does not pick one.
pub const DEFAULT_NAMESPACE: &str = "tasklog";

/// Trait for session storage backends.
///
/// Shared between the request gateway (reads the token on every call), the
/// session-expiry coordinator (clears everything) and the login flow (writes
/// the token), so implementations use interior mutability.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use tasklog_link::storage::SessionStore;
///
/// struct KeychainStore;
///
/// impl SessionStore for KeychainStore {
///     fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> { Ok(None) }
///     fn set_item(&self, key: &str, value: serde_json::Value) -> Result<()> { Ok(()) }
///     fn remove_item(&self, key: &str) -> Result<()> { Ok(()) }
///     fn clear_all(&self) -> Result<()> { Ok(()) }
/// }
/// ```
pub trait SessionStore: Send + Sync {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Overwrites any existing value.
    fn set_item(&self, key: &str, value: JsonValue) -> Result<()>;

    /// Returns `Ok(())` even if nothing was stored.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every item in this store's namespace.
    fn clear_all(&self) -> Result<()>;

    fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key)?.is_some())
    }
}

/// In-memory session store.
///
/// Does NOT persist anything across restarts. Useful for unit tests and for
/// processes that receive their token from the environment.
///
/// # Example
///
/// ```rust
/// use tasklog_link::storage::{MemorySessionStore, SessionStore};
///
/// let store = MemorySessionStore::new();
/// store.set_item("token", serde_json::json!("abc")).unwrap();
/// assert_eq!(store.get_item("token").unwrap(), Some(serde_json::json!("abc")));
/// ```
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    items: RwLock<HashMap<String, JsonValue>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a bearer token.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(TOKEN_KEY.to_string(), JsonValue::String(token.into()));
        store
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get_item(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.items.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: JsonValue) -> Result<()> {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.items.write().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

/// File-backed session store.
///
/// The file holds a JSON object keyed by namespace; each namespace is itself
/// an object of items. Several applications (or profiles) can share one file
/// without clearing each other's sessions.
///
/// ```json
/// {
///   "tasklog": { "token": { "access_token": "eyJhbGciOi..." } },
///   "staging": { "token": "eyJhbGciOi..." }
/// }
/// ```
///
/// On Unix the file is written with mode 0600.
#[derive(Debug)]
pub struct FileSessionStore {
    file_path: PathBuf,
    namespace: String,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

type SessionFile = BTreeMap<String, Map<String, JsonValue>>;

impl FileSessionStore {
    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self::with_namespace(file_path, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(file_path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            namespace: namespace.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self) -> Result<SessionFile> {
        if !self.file_path.exists() {
            return Ok(SessionFile::new());
        }
        let contents = fs::read_to_string(&self.file_path).map_err(|e| {
            TaskLinkError::StorageError(format!(
                "Cannot read session file '{}': {}",
                self.file_path.display(),
                e
            ))
        })?;
        if contents.trim().is_empty() {
            return Ok(SessionFile::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            TaskLinkError::StorageError(format!(
                "Corrupted session file '{}': {}. Delete it and log in again.",
                self.file_path.display(),
                e
            ))
        })
    }

    fn save(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    TaskLinkError::StorageError(format!(
                        "Failed to create session directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(file)?;
        fs::write(&self.file_path, contents).map_err(|e| {
            TaskLinkError::StorageError(format!(
                "Failed to write session file '{}': {}",
                self.file_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.file_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Map<String, JsonValue>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.load()?;
        let items = file.entry(self.namespace.clone()).or_default();
        f(items);
        if items.is_empty() {
            file.remove(&self.namespace);
        }
        self.save(&file)
    }
}

impl SessionStore for FileSessionStore {
    fn get_item(&self, key: &str) -> Result<Option<JsonValue>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = self.load()?;
        Ok(file.get(&self.namespace).and_then(|items| items.get(key)).cloned())
    }

    fn set_item(&self, key: &str, value: JsonValue) -> Result<()> {
        self.modify(|items| {
            items.insert(key.to_string(), value);
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|items| {
            items.remove(key);
        })
    }

    fn clear_all(&self) -> Result<()> {
        self.modify(|items| items.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get_item(TOKEN_KEY).unwrap(), None);

        store.set_item(TOKEN_KEY, json!({"access_token": "abc"})).unwrap();
        assert!(store.has_item(TOKEN_KEY).unwrap());

        store.remove_item(TOKEN_KEY).unwrap();
        assert!(!store.has_item(TOKEN_KEY).unwrap());
    }

    #[test]
    fn test_memory_store_clear_all() {
        let store = MemorySessionStore::with_token("abc");
        store.set_item("user", json!({"name": "ops"})).unwrap();
        assert_eq!(store.len(), 2);

        store.clear_all().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileSessionStore::with_path(&path);
        store.set_item(TOKEN_KEY, json!("tok-123")).unwrap();

        let reopened = FileSessionStore::with_path(&path);
        assert_eq!(reopened.get_item(TOKEN_KEY).unwrap(), Some(json!("tok-123")));
    }

    #[test]
    fn test_file_store_namespaces_are_isolated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let prod = FileSessionStore::with_namespace(&path, "prod");
        let staging = FileSessionStore::with_namespace(&path, "staging");
        prod.set_item(TOKEN_KEY, json!("p")).unwrap();
        staging.set_item(TOKEN_KEY, json!("s")).unwrap();

        prod.clear_all().unwrap();
        assert_eq!(prod.get_item(TOKEN_KEY).unwrap(), None);
        assert_eq!(staging.get_item(TOKEN_KEY).unwrap(), Some(json!("s")));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.get_item(TOKEN_KEY).unwrap(), None);
        store.clear_all().unwrap();
    }

    #[test]
    fn test_file_store_corrupted_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileSessionStore::with_path(&path).get_item(TOKEN_KEY).unwrap_err();
        assert!(matches!(err, TaskLinkError::StorageError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        FileSessionStore::with_path(&path).set_item(TOKEN_KEY, json!("x")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
