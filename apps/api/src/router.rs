use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use billing_cell::router::billing_routes;
use doctor_cell::router::doctor_routes;
use notification_cell::router::notification_routes;
use patient_cell::router::patient_routes;
use prescription_cell::router::prescription_routes;
use shared_utils::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/bills", billing_routes(state))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "clinic-api"
    }))
}
