use shared_models::error::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound(format!("{}/{}", collection, id))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::AlreadyExists(msg) => AppError::Conflict(msg),
            StoreError::PreconditionFailed(msg) => AppError::Conflict(msg),
            StoreError::InvalidWrite(msg) => AppError::BadRequest(msg),
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::Serialization(msg) => AppError::Database(msg),
        }
    }
}
