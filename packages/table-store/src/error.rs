//! Error types for table stores.

use std::path::PathBuf;

/// Errors raised by a [`TableStore`](crate::TableStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the table map failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing file exists but does not hold a table map.
    #[error("database file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// A table entry holds something other than a key map.
    #[error("table '{table}' is not a key map")]
    NotATable { table: String },

    /// The store was used after `flush_and_close`.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
