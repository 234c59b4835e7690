use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn billing_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_bill))
        .route("/{bill_id}", get(handlers::get_bill))
        .route("/{bill_id}/confirm", post(handlers::confirm_bill))
        .route("/patients/{patient_id}", get(handlers::get_patient_bills))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_bills))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
