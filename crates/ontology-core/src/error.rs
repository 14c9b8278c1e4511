//! Error types for Ontology Core

use crate::id::Id;
use crate::limits::ValidationError;
use thiserror::Error;

/// Result type alias using Ontology's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed failure raised by a backing engine
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Ontology error types
///
/// Everything except [`Error::Backend`] describes a problem with the request
/// itself. Backend failures (storage, query compilation, transport) are always
/// wrapped in [`Error::Backend`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(Id),

    #[error("Unknown type: {0}")]
    UnknownType(Id),

    #[error("Type already registered: {0}")]
    DuplicateType(Id),

    #[error("Types span more than one branch: {0}")]
    MixedBranch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),
}

impl Error {
    /// Wrap an engine failure
    pub fn backend(err: impl Into<BackendError>) -> Self {
        Self::Backend(err.into())
    }

    /// True when the error was caused by the backing engine rather than the request
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
