use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

/// Record in `users`: which role an account signed up with and whether its profile form is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub uid: String,
    pub email: String,
    pub role: Role,
    pub profile_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub role: Role,
    /// Defaults to the email carried by the token.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("User record not found")]
    NotFound,

    #[error("User is already registered")]
    AlreadyRegistered,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AuthError::NotFound,
            StoreError::AlreadyExists(_) => AuthError::AlreadyRegistered,
            StoreError::Unavailable(msg) => AuthError::StoreUnavailable(msg),
            other => AuthError::Database(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound => AppError::NotFound(e.to_string()),
            AuthError::AlreadyRegistered => AppError::Conflict(e.to_string()),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            AuthError::Database(msg) => AppError::Database(msg),
        }
    }
}
