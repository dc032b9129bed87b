//! Error types for store operations.

use medisync_model::{ModelError, RecordKey};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this key exists.
    #[error("record {0} not found")]
    NotFound(RecordKey),

    /// A record with this key already exists.
    #[error("record {0} already exists")]
    DuplicateKey(RecordKey),

    /// The record is marked for deletion and cannot be edited.
    #[error("record {0} is pending deletion")]
    RecordDeleted(RecordKey),

    /// A persisted row carries a sync status outside the known set.
    #[error("invalid row in table {table}: {source}")]
    InvalidStatus {
        /// Table the row was read from.
        table: String,
        /// The underlying parse error.
        #[source]
        source: ModelError,
    },

    /// Another process holds the table lock.
    #[error("table is locked by another process: {0}")]
    Locked(PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A table file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
