use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::warn;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::jwt::{decode_token, validate_token};
use crate::state::AppState;

// Middleware for authentication
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = validate_token(bearer_token(&request)?, &state.config.supabase_jwt_secret)?;

    // Add user to request extensions
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Like `auth_middleware`, but also admits accounts that have not picked a role yet.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = decode_token(bearer_token(&request)?, &state.config.supabase_jwt_secret)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn bearer_token<B>(request: &Request<B>) -> Result<&str, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Resolve the caller's role or reject with 403.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<Role, AppError> {
    match user.role() {
        Some(role) if allowed.contains(&role) => Ok(role),
        other => {
            warn!("User {} with role {:?} denied; requires one of {:?}", user.id, other, allowed);
            Err(AppError::Forbidden(format!(
                "Requires role: {}",
                allowed.iter().map(Role::as_str).collect::<Vec<_>>().join(" or ")
            )))
        }
    }
}

/// The caller acts on their own resource, or is an admin.
pub fn require_self_or_admin(user: &User, owner_id: &str) -> Result<(), AppError> {
    if user.id == owner_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized to access this resource".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(role: Option<Role>) -> User {
        User {
            id: "u1".to_string(),
            email: None,
            role,
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn require_role_accepts_listed_roles() {
        assert_eq!(require_role(&user(Some(Role::Doctor)), &[Role::Doctor, Role::Admin]).unwrap(), Role::Doctor);
        assert_matches!(require_role(&user(Some(Role::Patient)), &[Role::Doctor]), Err(AppError::Forbidden(_)));
        assert_matches!(require_role(&user(None), &[Role::Patient]), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn self_or_admin() {
        assert!(require_self_or_admin(&user(Some(Role::Patient)), "u1").is_ok());
        assert!(require_self_or_admin(&user(Some(Role::Admin)), "someone-else").is_ok());
        assert!(require_self_or_admin(&user(Some(Role::Doctor)), "someone-else").is_err());
    }
}
