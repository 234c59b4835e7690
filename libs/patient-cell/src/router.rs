use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;

pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_patients))
        .route("/profile", post(register_profile).get(get_own_profile))
        .route("/{id}", get(get_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
