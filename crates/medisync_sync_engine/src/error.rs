//! Error types for the sync engine.

use medisync_model::RecordKey;
use medisync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How the synchronizer reacts to a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeouts, refused connections, 5xx: abort the pass and retry later.
    Transient,
    /// The remote refused this record: skip it and keep going.
    Rejected,
    /// The remote no longer has the record.
    NotFound,
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The remote answered with a 5xx status.
    #[error("server error {status}: {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The remote refused the request with a 4xx status other than 404.
    #[error("request rejected with {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The remote answered 404.
    #[error("record {key:?} not found on remote")]
    NotFound {
        /// Key that was requested, if the call addressed one record.
        key: Option<RecordKey>,
    },

    /// The record's parent still has a temporary key, so the remote cannot
    /// resolve it.
    #[error("parent record {parent} has not been synchronized")]
    UnsyncedParent {
        /// Temporary key of the parent.
        parent: RecordKey,
    },

    /// A payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Not connected.
    #[error("remote is not reachable")]
    NotConnected,

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: impl Into<String>, key: Option<RecordKey>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound { key },
            400..=499 => Self::Rejected { status, message },
            _ => Self::ServerError { status, message },
        }
    }

    /// Classifies the error for the push algorithm.
    ///
    /// Decoding problems count as rejections of the record at hand; local
    /// store failures abort the pass like a network failure so the record
    /// is retried next time.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            SyncError::Transport { retryable: true, .. }
            | SyncError::Timeout
            | SyncError::ServerError { .. }
            | SyncError::NotConnected
            | SyncError::Store(_) => FailureClass::Transient,
            SyncError::NotFound { .. } => FailureClass::NotFound,
            SyncError::Transport {
                retryable: false, ..
            }
            | SyncError::Rejected { .. }
            | SyncError::UnsyncedParent { .. }
            | SyncError::Protocol(_)
            | SyncError::InvalidConfig(_) => FailureClass::Rejected,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.failure_class() == FailureClass::Transient
    }
}
