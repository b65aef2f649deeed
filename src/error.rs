//! Error types for the record store.
//!
//! Only real failures live here. Expected absence (a duplicate key on
//! `add`, a missing key on `update`/`delete`) is reported through `bool`
//! and `Option` returns instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at {location}: {message}")]
    Parse { location: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Value for field {field} cannot be stored in this format: {value:?}")]
    UnencodableValue { field: String, value: String },

    #[error("Invalid value for field {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized: {0}")]
    NotInitialized(PathBuf),

    #[error("No store is bound to this session")]
    Unbound,
}

impl StoreError {
    /// Parse error for a 1-based line of a text file.
    pub fn parse_line(line: usize, message: impl Into<String>) -> Self {
        StoreError::Parse {
            location: format!("line {line}"),
            message: message.into(),
        }
    }

    /// Parse error for a 0-based entry of a document.
    pub fn parse_entry(index: usize, message: impl Into<String>) -> Self {
        StoreError::Parse {
            location: format!("entry {index}"),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
