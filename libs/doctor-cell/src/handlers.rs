use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::AppState;

use crate::models::{ApprovedDoctorsQuery, CredentialsRequest, DoctorListQuery, StatusUpdateRequest};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn submit_credentials(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let doctor = DoctorService::new(&state)
        .submit_credentials(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

/// Waiting screen: the calling doctor's own approval state.
#[axum::debug_handler]
pub async fn my_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let status = DoctorService::new(&state).waiting_status(&user.id).await?;

    Ok(Json(json!({
        "doctor_id": user.id,
        "status": status
    })))
}

#[axum::debug_handler]
pub async fn list_approved_doctors(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Query(query): Query<ApprovedDoctorsQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&state)
        .list_approved_doctors(query.specialization.as_deref())
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctors = DoctorService::new(&state).list_doctors(query.status).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get_doctor(&doctor_id).await?;

    // Unapproved profiles are visible to their owner and to admins only.
    if !doctor.is_approved() && user.id != doctor.id && !user.is_admin() {
        return Err(AppError::Forbidden("Doctor profile is not public".to_string()));
    }

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctor = DoctorService::new(&state)
        .set_status(&doctor_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}
