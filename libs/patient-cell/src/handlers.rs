use std::sync::Arc;
use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::AppState;

use crate::models::{PatientError, RegisterProfileRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn register_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;

    let profile = PatientService::new(&state)
        .register_profile(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "patient": profile
    })))
}

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;

    let profile = PatientService::new(&state).get_profile(&user.id).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if user.id != patient_id && !user.has_role(Role::Doctor) && !user.is_admin() {
        return Err(PatientError::Unauthorized.into());
    }

    let profile = PatientService::new(&state).get_profile(&patient_id).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;

    let patients = PatientService::new(&state).list_patients().await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
