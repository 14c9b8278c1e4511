//! Engine error types

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures raised while persisting or evaluating inside an engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gremlin server returned status {code}: {message}")]
    GremlinStatus { code: u16, message: String },

    #[cfg(feature = "gremlin")]
    #[error("HTTP error: {0}")]
    Http(#[from] ::reqwest::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    Redb(#[from] ::redb::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("ReDB table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[cfg(feature = "redb")]
    #[error("ReDB storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("ReDB commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("ReDB transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),
}

impl EngineError {
    pub(crate) fn lock<E: std::fmt::Display>(err: E) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<EngineError> for ontology_core::Error {
    fn from(err: EngineError) -> Self {
        ontology_core::Error::backend(err)
    }
}
