//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when parsing model values from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A stored sync status string is not one of the four known values.
    #[error("unknown sync status: {0:?}")]
    UnknownSyncStatus(String),

    /// An entity kind name is not recognized.
    #[error("unknown entity kind: {0:?}")]
    UnknownEntityKind(String),
}
