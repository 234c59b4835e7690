use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;
use shared_utils::AppState;

use crate::models::CreatePrescriptionRequest;
use crate::services::PrescriptionService;

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let prescription = PrescriptionService::new(&state)
        .create_prescription(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": prescription,
        "message": "Prescription created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let prescription = PrescriptionService::new(&state)
        .get_prescription_for(&user, &prescription_id)
        .await?;

    Ok(Json(json!(prescription)))
}

#[axum::debug_handler]
pub async fn get_patient_prescriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let prescriptions = PrescriptionService::new(&state)
        .list_for_patient(&user, &patient_id)
        .await?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_prescriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let prescriptions = PrescriptionService::new(&state)
        .list_for_doctor(&user, &doctor_id)
        .await?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}
