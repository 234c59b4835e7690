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

use crate::models::CreateBillRequest;
use crate::services::BillingService;

#[axum::debug_handler]
pub async fn create_bill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBillRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;

    let bill = BillingService::new(&state).create_bill(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "bill": bill,
        "message": "Bill generated successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(bill_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let bill = BillingService::new(&state).get_bill_for(&user, &bill_id).await?;

    Ok(Json(json!(bill)))
}

#[axum::debug_handler]
pub async fn confirm_bill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(bill_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let bill = BillingService::new(&state).confirm_bill(&user, &bill_id).await?;

    Ok(Json(json!({
        "success": true,
        "bill": bill
    })))
}

#[axum::debug_handler]
pub async fn get_patient_bills(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let bills = BillingService::new(&state).list_for_patient(&user, &patient_id).await?;

    Ok(Json(json!({
        "bills": bills,
        "total": bills.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_bills(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let bills = BillingService::new(&state).list_for_doctor(&user, &doctor_id).await?;

    Ok(Json(json!({
        "bills": bills,
        "total": bills.len()
    })))
}
