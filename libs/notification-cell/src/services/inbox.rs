use std::sync::Arc;

use tracing::{debug, info, warn};

use shared_database::collections::NOTIFICATIONS;
use shared_database::{DocumentStore, FieldWrite, Query, WriteBatch};
use shared_utils::AppState;

use crate::models::{Notification, NotificationError};

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
}

impl NotificationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// The recipient's notifications, newest first.
    pub async fn list_for(&self, user_id: &str) -> Result<Vec<Notification>, NotificationError> {
        debug!("Listing notifications for: {}", user_id);

        let query = Query::new(NOTIFICATIONS)
            .filter_eq("user_id", user_id)
            .order_by_desc("created_at");

        let docs = self.store.query(&query).await?;
        docs.iter()
            .map(|doc| doc.deserialize().map_err(NotificationError::from))
            .collect()
    }

    async fn owned(&self, user_id: &str, notification_id: &str) -> Result<Notification, NotificationError> {
        let notification: Notification = self
            .store
            .get(NOTIFICATIONS, notification_id)
            .await?
            .ok_or(NotificationError::NotFound)?
            .deserialize()?;

        if notification.user_id != user_id {
            warn!("User {} tried to touch notification {} of {}", user_id, notification_id, notification.user_id);
            return Err(NotificationError::Forbidden);
        }

        Ok(notification)
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<Notification, NotificationError> {
        let mut notification = self.owned(user_id, notification_id).await?;
        if notification.read {
            return Ok(notification);
        }

        self.store
            .update(NOTIFICATIONS, notification_id, vec![FieldWrite::set("read", true)])
            .await?;
        notification.read = true;

        Ok(notification)
    }

    /// Returns how many notifications flipped to read.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, NotificationError> {
        let unread: Vec<_> = self
            .list_for(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.read)
            .collect();

        if unread.is_empty() {
            return Ok(0);
        }

        let batch = unread.iter().fold(WriteBatch::new(), |batch, n| {
            batch.update(NOTIFICATIONS, &n.id, vec![FieldWrite::set("read", true)])
        });
        self.store.commit(batch).await?;

        info!("Marked {} notifications read for {}", unread.len(), user_id);
        Ok(unread.len())
    }

    pub async fn delete(&self, user_id: &str, notification_id: &str) -> Result<(), NotificationError> {
        self.owned(user_id, notification_id).await?;
        self.store.delete(NOTIFICATIONS, notification_id).await?;

        info!("Deleted notification {}", notification_id);
        Ok(())
    }
}
