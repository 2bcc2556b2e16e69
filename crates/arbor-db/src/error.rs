//! Database-specific error types and conversions.

use arbor_core::error::ArborError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Failed to decode stored record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflicting mutation: {0}")]
    Conflict(String),
}

impl From<DbError> for ArborError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ArborError::NotFound { entity, id },
            DbError::Conflict(message) => ArborError::Conflict { message },
            DbError::Decode(message) => ArborError::Internal(message),
            other => ArborError::StorageUnavailable(other.to_string()),
        }
    }
}
