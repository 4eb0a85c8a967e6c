//! Host-owned key/value preference storage.
//!
//! The scanner only persists which camera position the user last selected,
//! but the store is generic so hosts can share one with other settings.

use crate::error::PreferenceError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key under which the selected camera position is stored
pub const CAMERA_POSITION_KEY: &str = "scan_camera_mode";

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<i64>;
    fn set(&self, key: &str, value: i64) -> Result<(), PreferenceError>;
}

/// Volatile store, used by tests and by hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<BTreeMap<String, i64>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.read().get(key).copied()
    }

    fn set(&self, key: &str, value: i64) -> Result<(), PreferenceError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON-file backed store; the whole map is rewritten on every change
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, i64>>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing file starts empty; a malformed file
    /// is an error so user preferences are never silently discarded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PreferenceError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| PreferenceError::Malformed {
                    path: path.display().to_string(),
                    details: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Preference file {} not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(PreferenceError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, i64>) -> Result<(), PreferenceError> {
        let write_err = |source| PreferenceError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let contents =
            serde_json::to_string_pretty(values).map_err(|e| PreferenceError::Malformed {
                path: self.path.display().to_string(),
                details: e.to_string(),
            })?;
        fs::write(&self.path, contents).map_err(write_err)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.read().get(key).copied()
    }

    fn set(&self, key: &str, value: i64) -> Result<(), PreferenceError> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value);
        if let Err(e) = self.persist(&values) {
            warn!("Failed to persist preference {}: {}", key, e);
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
