//! Key-value stores: a persisted one for settings and templates, an ephemeral
//! one for the session cache and completion flag.

use crate::errors::TimecardError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Storage keys, shared with the page-side script.
pub mod keys {
    // session (cleared when the tab/agent goes away)
    pub const TASKS_CACHE: &str = "devops_tasks_cache";
    pub const COMPLETE_JSON: &str = "devOpsCompleteJSON";
    pub const DATA_INSERTED: &str = "dataAlreadyInserted";
    pub const ROW_JSON: &str = "devOpsRowJSON";

    // persisted
    pub const USERNAME: &str = "devops_username";
    pub const TOKEN: &str = "devops_token";
    pub const ORG_URL: &str = "ado_orgUrl";
    pub const PROJECT: &str = "ado_project";
    pub const API_VERSION: &str = "ado_apiVersion";
    pub const TEMPLATES: &str = "comment_templates";
    pub const FILTER_START_DATE: &str = "ado_filter_start_date";
    pub const FILTER_END_DATE: &str = "ado_filter_end_date";
    pub const FEATURE_AZURE_DEVOPS: &str = "feature_azure_devops";
}

/// String key → string value store. Read-modify-write sequences are not
/// transactional.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), TimecardError>;
    fn remove(&self, key: &str) -> Result<(), TimecardError>;

    /// `get` treating the empty string as absent.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

/// Process-lifetime store, the equivalent of `sessionStorage`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TimecardError> {
        self.entries
            .lock()
            .map_err(|_| TimecardError::Storage("session store lock poisoned".into()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TimecardError> {
        self.entries
            .lock()
            .map_err(|_| TimecardError::Storage("session store lock poisoned".into()))?
            .remove(key);
        Ok(())
    }
}

/// JSON-file backed store, the equivalent of `localStorage`. The whole map is
/// rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. A corrupt file is logged
    /// and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TimecardError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                TimecardError::Storage(format!("Failed to read {}: {e}", path.display()))
            })?;
            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file is not valid JSON, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "opened store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// `$TIMECARD_STORE`, else `{config_dir}/timecard/store.json`.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("TIMECARD_STORE") {
            PathBuf::from(path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("timecard")
                .join("store.json")
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), TimecardError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    TimecardError::Storage(format!("Failed to create {}: {e}", dir.display()))
                })?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content).map_err(|e| {
            TimecardError::Storage(format!("Failed to write {}: {e}", self.path.display()))
        })
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), TimecardError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TimecardError::Storage("store lock poisoned".into()))?;
        // Memory only changes once the file holds the new state.
        let mut next = entries.clone();
        f(&mut next);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TimecardError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), TimecardError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

const FLAG_PENDING: &str = "0";
const FLAG_DONE: &str = "1";

/// Cross-task signal that a grid insertion was verified. Written by the grid
/// engine, polled by the dialog, cleared once consumed.
#[derive(Clone)]
pub struct CompletionFlag {
    store: Arc<dyn KeyValueStore>,
}

impl CompletionFlag {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Arm the flag ("0").
    pub fn reset(&self) -> Result<(), TimecardError> {
        self.store.set(keys::DATA_INSERTED, FLAG_PENDING)
    }

    /// Signal completion ("1").
    pub fn mark_done(&self) -> Result<(), TimecardError> {
        self.store.set(keys::DATA_INSERTED, FLAG_DONE)
    }

    pub fn is_done(&self) -> bool {
        self.store.get(keys::DATA_INSERTED).as_deref() == Some(FLAG_DONE)
    }

    /// Raw stored value, if any.
    pub fn raw(&self) -> Option<String> {
        self.store.get(keys::DATA_INSERTED)
    }

    pub fn clear(&self) -> Result<(), TimecardError> {
        self.store.remove(keys::DATA_INSERTED)
    }
}
