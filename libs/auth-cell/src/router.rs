use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::identity_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn auth_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token));

    // A fresh account has no role until it signs up.
    let protected_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/me", get(handlers::me))
        .layer(middleware::from_fn_with_state(state.clone(), identity_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
