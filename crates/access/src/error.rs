//! Access-control errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the permission store
#[derive(Error, Debug)]
pub enum AccessError {
    /// The request was rejected before touching the collection
    #[error("Validation error: {0}")]
    Validation(String),

    /// The collection changed in memory but could not be written out
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistError),
}

impl AccessError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AccessError::Validation(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, AccessError::Persistence(_))
    }
}

/// Storage backend failures
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
