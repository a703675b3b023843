//! Error types shared by every backup workflow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dashboard API error (status {status}): {body}")]
    RemoteApi { status: u16, body: String },

    #[error("Failed to read {key}: {reason}")]
    StoreRead { key: String, reason: String },

    #[error("Failed to write {key}: {reason}")]
    StoreWrite { key: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl BackupError {
    pub fn store_read(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BackupError::StoreRead {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn store_write(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BackupError::StoreWrite {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the "nothing there" outcome, which callers report as a warning.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackupError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
