//! Storage backends for the permission collection
//!
//! The store always writes the whole collection; a backend only has to
//! load and replace one ordered list.

use crate::error::PersistError;
use crate::record::PermissionRecord;
use docket_core::fs::write_atomic;
use std::path::{Path, PathBuf};

/// Where the permission collection lives between sessions
pub trait PermissionBackend {
    /// Load the persisted collection; `None` when nothing was saved yet
    fn load(&self) -> Result<Option<Vec<PermissionRecord>>, PersistError>;

    /// Replace the persisted collection
    fn save(&mut self, records: &[PermissionRecord]) -> Result<(), PersistError>;
}

/// Pretty-printed JSON array on disk
///
/// Storage: ~/.local/share/docket/permissions.json
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PermissionBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Vec<PermissionRecord>>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let records = serde_json::from_str(&content)?;
        Ok(Some(records))
    }

    fn save(&mut self, records: &[PermissionRecord]) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, content.as_bytes()).map_err(|e| self.io_error(e))
    }
}

/// In-process backend
///
/// Writes can be switched off to simulate a full or unavailable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    saved: Option<Vec<PermissionRecord>>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already holds a persisted collection
    pub fn with_records(records: Vec<PermissionRecord>) -> Self {
        Self {
            saved: Some(records),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Last successfully saved collection
    pub fn saved(&self) -> Option<&[PermissionRecord]> {
        self.saved.as_deref()
    }

    /// Number of successful saves
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PermissionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Vec<PermissionRecord>>, PersistError> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, records: &[PermissionRecord]) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Unavailable("storage quota exceeded".to_string()));
        }
        self.saved = Some(records.to_vec());
        self.writes += 1;
        Ok(())
    }
}
