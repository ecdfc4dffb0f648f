//! Error types shared by the core crate and the storage backends.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the domain layer and the persisted-state store.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend database failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A persisted value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store failure that is not tied to a database backend
    #[error("Store error: {0}")]
    Store(String),

    /// A programming invariant did not hold
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
