//! Error types for the core crate.

use thiserror::Error;

/// Core errors.
#[derive(Error, Debug)]
pub enum CoreError {
    /// WKT parsing error.
    #[error("WKT parse error: {0}")]
    WktParse(String),

    /// Geometry payload that cannot be evaluated (non-finite coordinates,
    /// empty geometry, unsupported structure).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Referenced dataset, snapshot, or diff does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A state transition that has already been taken (e.g. re-reviewing
    /// a reviewed diff).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage-level error from the backing store.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        CoreError::Storage(msg.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
