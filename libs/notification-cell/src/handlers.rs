use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::services::NotificationService;

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notifications = NotificationService::new(&state).list_for(&user.id).await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len(),
        "unread": unread
    })))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let notification = NotificationService::new(&state)
        .mark_read(&user.id, &notification_id)
        .await?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let updated = NotificationService::new(&state).mark_all_read(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "updated": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    NotificationService::new(&state)
        .delete(&user.id, &notification_id)
        .await?;

    Ok(Json(json!({ "success": true })))
}
