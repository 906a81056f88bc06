//! Stable per-client conversation identifier.
//!
//! The identifier is generated once, persisted under [`SESSION_STORAGE_KEY`],
//! and returned unchanged on every later call in the same storage scope.
//! When storage is unavailable the store silently degrades to an
//! in-memory identifier that lives as long as the store itself.

use crate::error::{Result, WidgetError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

/// Fixed storage key for the session identifier.
pub const SESSION_STORAGE_KEY: &str = "ai-widget-session";

/// Durable client-side key-value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage. Its scope is the lifetime of the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty storage scope.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| WidgetError::Storage(format!("memory storage lock poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| WidgetError::Storage(format!("memory storage lock poisoned: {e}")))?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// JSON-file-backed storage.
///
/// All keys live in one JSON object. Writes are atomic
/// (temp file, fsync, rename).
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage backed by the given file. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at the platform default location.
    pub fn at_default_location() -> Self {
        Self::new(crate::widget_dirs::storage_file())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(WidgetError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            WidgetError::Storage(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| {
            WidgetError::Storage(format!("failed to create {}: {e}", parent.display()))
        })?;

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| WidgetError::Storage(format!("failed to serialize storage: {e}")))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "storage".to_owned());
        let tmp_path = parent.join(format!(".{file_name}.tmp"));
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            WidgetError::Storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;

        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            WidgetError::Storage(format!(
                "failed to rename temp file to {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }
}

/// Hands out the session identifier for one storage scope.
pub struct SessionIdentityStore {
    storage: Arc<dyn KeyValueStorage>,
    ephemeral: OnceLock<String>,
}

impl SessionIdentityStore {
    /// Create a store over the given storage backend.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            ephemeral: OnceLock::new(),
        }
    }

    /// Return the persisted session id, creating and persisting one if needed.
    ///
    /// Never fails: storage errors degrade to an in-memory id that stays
    /// stable for the lifetime of this store.
    pub fn get_or_create_session_id(&self) -> String {
        if let Some(id) = self.ephemeral.get() {
            return id.clone();
        }

        match self.storage.get(SESSION_STORAGE_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => id,
            Ok(_) => {
                let id = generate_session_id();
                match self.storage.set(SESSION_STORAGE_KEY, &id) {
                    Ok(()) => {
                        debug!(session_id = %id, "created new session id");
                        id
                    }
                    Err(e) => {
                        warn!(error = %e, "session storage unwritable, using in-memory session id");
                        self.ephemeral.get_or_init(|| id).clone()
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "session storage unreadable, using in-memory session id");
                self.ephemeral.get_or_init(generate_session_id).clone()
            }
        }
    }
}

impl std::fmt::Debug for SessionIdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentityStore")
            .field("ephemeral", &self.ephemeral.get().is_some())
            .finish()
    }
}

/// Generate a fresh 128-bit session identifier.
///
/// Format: `sess_{uuid-v4-simple}`
pub fn generate_session_id() -> String {
    format!("sess_{}", uuid::Uuid::new_v4().simple())
}
