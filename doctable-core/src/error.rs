//! Error types and result types for database operations.
//!
//! Construction-time failures ([`DatabaseError::Configuration`], [`DatabaseError::Connection`])
//! are kept apart from per-call store failures ([`DatabaseError::Operation`]). An absent
//! result is never an error: lookups return `Option` and writes return counts.
//! Use [`DatabaseResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a database.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The connection endpoint or database name is missing or empty.
    ///
    /// Raised synchronously at construction and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The store could not be reached within the configured timeout at construction.
    ///
    /// Fatal to the instance being built; callers may retry by building a new one.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A single call against the store failed (network interruption, write conflict,
    /// invalid pipeline stage, ...). Propagated as-is, without retry.
    #[error("Operation error: {0}")]
    Operation(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A caller-supplied document or patch names a field owned by the audit stamper.
    #[error("Field `{0}` is reserved and cannot be set by the caller")]
    ReservedField(String),
    /// The document or directive has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// A specialized `Result` type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl From<BsonError> for DatabaseError {
    fn from(err: BsonError) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DatabaseError {
    fn from(err: SerdeJsonError) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}
