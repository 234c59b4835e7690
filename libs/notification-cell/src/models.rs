use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::collections::NOTIFICATIONS;
use shared_database::{FieldWrite, StoreError, WriteBatch};
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// A notification about to be written; `user_id` is the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    pub fn fields(&self) -> Vec<FieldWrite> {
        vec![
            FieldWrite::set("user_id", self.user_id.as_str()),
            FieldWrite::set("title", self.title.as_str()),
            FieldWrite::set("message", self.message.as_str()),
            FieldWrite::set("read", false),
            FieldWrite::server_timestamp("created_at"),
        ]
    }

    /// Add this notification to `batch` so it is written with the change that caused it.
    pub fn stage(&self, batch: WriteBatch) -> WriteBatch {
        batch.create(NOTIFICATIONS, None, self.fields())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Not the recipient of this notification")]
    Forbidden,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for NotificationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => NotificationError::NotFound,
            StoreError::Unavailable(msg) => NotificationError::StoreUnavailable(msg),
            other => NotificationError::Database(other.to_string()),
        }
    }
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::NotFound => AppError::NotFound(e.to_string()),
            NotificationError::Forbidden => AppError::Forbidden(e.to_string()),
            NotificationError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            NotificationError::Database(msg) => AppError::Database(msg),
        }
    }
}
