use thiserror::Error;

use docflow_core::workflow::StoreError;

pub mod document;
pub mod participant;

pub use document::SqlDocumentRepository;
pub use participant::SqlParticipantRegistry;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("stale write: {0}")]
    StaleWrite(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
            RepositoryError::StaleWrite(message) => Self::Conflict(message),
        }
    }
}

fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
