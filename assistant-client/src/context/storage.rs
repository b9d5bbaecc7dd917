//! Key/value local storage for the conversation.
//!
//! Writes are applied as a batch so the message log and the session id can
//! never be persisted apart.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const DOCUMENT_FILE: &str = "conversation.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put { key: String, value: String },
    Remove { key: String },
}

impl StoreOp {
    pub fn put(key: &str, value: impl Into<String>) -> Self {
        StoreOp::Put {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn remove(key: &str) -> Self {
        StoreOp::Remove {
            key: key.to_string(),
        }
    }
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Apply every operation or none of them.
    fn apply(&self, batch: Vec<StoreOp>) -> Result<(), StorageError>;
}

fn apply_ops(map: &mut BTreeMap<String, String>, batch: Vec<StoreOp>) {
    for op in batch {
        match op {
            StoreOp::Put { key, value } => {
                map.insert(key, value);
            }
            StoreOp::Remove { key } => {
                map.remove(&key);
            }
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn apply(&self, batch: Vec<StoreOp>) -> Result<(), StorageError> {
        let mut entries = self.entries();
        apply_ops(&mut entries, batch);
        Ok(())
    }
}

/// Store keeping every key in one JSON document on disk. Each batch rewrites
/// the document through a temporary file and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            path: directory.as_ref().join(DOCUMENT_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing or unreadable one is empty.
    fn read_document(&self) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable conversation store");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Corrupt conversation store, starting empty");
            BTreeMap::new()
        })
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.read_document().remove(key))
    }

    fn apply(&self, batch: Vec<StoreOp>) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut document = self.read_document();
        apply_ops(&mut document, batch);
        self.write_document(&document)
    }
}
