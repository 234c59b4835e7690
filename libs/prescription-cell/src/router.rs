use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_prescription))
        .route("/{prescription_id}", get(handlers::get_prescription))
        .route("/patients/{patient_id}", get(handlers::get_patient_prescriptions))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_prescriptions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
