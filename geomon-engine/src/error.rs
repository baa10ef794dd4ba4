//! Engine error type and its HTTP mapping.

use geomon_core::error::CoreError;
use geomon_core::id::DatasetId;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Referenced dataset, snapshot, or diff does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A state transition already taken (re-review, concurrent run start).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or unacceptable caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Classification requested against a deactivated dataset.
    #[error("Dataset {0} is inactive")]
    InactiveDataset(DatasetId),

    /// Core-layer error that is not a not-found or conflict.
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        // Keep the caller-addressable categories addressable.
        match err {
            CoreError::NotFound(msg) => EngineError::NotFound(msg),
            CoreError::Conflict(msg) => EngineError::Conflict(msg),
            other => EngineError::Core(other),
        }
    }
}

impl EngineError {
    /// HTTP status an API layer should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::Conflict(_) => 409,
            EngineError::InvalidInput(_) => 400,
            EngineError::InactiveDataset(_) => 400,
            EngineError::Core(CoreError::WktParse(_)) => 400,
            EngineError::Core(CoreError::InvalidGeometry(_)) => 400,
            EngineError::Core(_) => 500,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_categories_survive_conversion() {
        let err: EngineError = CoreError::not_found("diff x").into();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(err.status_code(), 404);

        let err: EngineError = CoreError::conflict("already reviewed").into();
        assert_eq!(err.status_code(), 409);

        let err: EngineError = CoreError::WktParse("bad".into()).into();
        assert_eq!(err.status_code(), 400);

        let err: EngineError = CoreError::storage("disk").into();
        assert_eq!(err.status_code(), 500);
    }
}
