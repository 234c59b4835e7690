use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt;
use shared_utils::AppState;

use crate::models::SignupRequest;
use crate::services::UserService;

fn bearer_token(auth: Option<TypedHeader<Authorization<Bearer>>>) -> Result<String, AppError> {
    auth.map(|TypedHeader(header)| header.token().to_string())
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))
}

pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(auth)?;
    let user = jwt::validate_token(&token, &state.config.supabase_jwt_secret)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(auth)?;
    let valid = jwt::validate_token(&token, &state.config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    let account = UserService::new(&state).signup(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": account
    })))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting user record for: {}", user.id);

    let account = UserService::new(&state).get_account(&user.id).await?;

    Ok(Json(json!(account)))
}
