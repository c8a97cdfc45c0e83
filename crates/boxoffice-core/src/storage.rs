//! Local key-value storage for session state.
//!
//! Mirrors the browser's `localStorage`: string keys, string values, last
//! write wins. The session manager only ever touches [`TOKEN_KEY`] and
//! [`USER_KEY`].
//!
//! ```text
//! ~/.config/boxoffice/
//! ├── config.json      # Client configuration
//! └── storage.json     # { "token": "...", "user": "{...}" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::User;

/// Storage key for the bearer credential.
pub const TOKEN_KEY: &str = "token";

/// Storage key for the serialized user record.
pub const USER_KEY: &str = "user";

const STORAGE_FILE: &str = "storage.json";

/// File the HTTP cookie jar is kept in, next to `storage.json`.
pub const COOKIE_FILE: &str = "cookies.json";

/// Error type for storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// IO error
    Io(std::io::Error),
    /// JSON error
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "IO error: {e}"),
            StorageError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

/// Durable string storage shared by everything in one client context.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().unwrap().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON file in the config directory.
///
/// The whole map is kept in memory and rewritten on every mutation using
/// write-then-rename, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open storage in `dir`, loading any existing file.
    ///
    /// A file that fails to parse is treated as empty and overwritten on the
    /// next write.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(STORAGE_FILE);
        let items = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("Ignoring unreadable storage file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORAGE_FILE)
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let file_path = self.dir.join(STORAGE_FILE);
        let temp_path = self.dir.join(format!("{STORAGE_FILE}.tmp"));

        let json = serde_json::to_string_pretty(items)?;
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().unwrap().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap();
        items.insert(key.to_string(), value.to_string());
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap();
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }
}

// ============================================================================
// Session helpers
// ============================================================================

/// What a previous run left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSession {
    pub token: Option<String>,
    pub user: Option<User>,
}

/// Read the persisted token and user. An unparseable user record is ignored.
pub fn load_session(storage: &dyn SessionStorage) -> PersistedSession {
    let token = storage.get_item(TOKEN_KEY).filter(|t| !t.is_empty());
    let user = storage
        .get_item(USER_KEY)
        .and_then(|raw| match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("Discarding unreadable persisted user: {}", e);
                None
            }
        });

    PersistedSession { token, user }
}

/// Persist the user record and, when present, the token.
pub fn save_session(
    storage: &dyn SessionStorage,
    user: &User,
    token: Option<&str>,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(user)?;
    storage.set_item(USER_KEY, &json)?;
    if let Some(token) = token {
        storage.set_item(TOKEN_KEY, token)?;
    }
    Ok(())
}

/// Remove both session keys. Tries both even if the first removal fails.
pub fn clear_session(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    let token = storage.remove_item(TOKEN_KEY);
    let user = storage.remove_item(USER_KEY);
    token.and(user)
}

// ============================================================================
// TESTS
// ============================================================================
