use std::sync::Arc;

use tracing::{debug, info, warn};

use doctor_cell::services::DoctorService;
use shared_database::collections::{DOCTORS, USERS};
use shared_database::{DocumentStore, FieldWrite, WriteBatch};
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{AuthError, SignupRequest, UserAccount};

pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Create the caller's `users` record. Doctors also get a profile in `waiting`, in the same commit.
    pub async fn signup(&self, caller: &User, request: SignupRequest) -> Result<UserAccount, AuthError> {
        if request.role == Role::Admin {
            warn!("User {} attempted to sign up as admin", caller.id);
            return Err(AuthError::Forbidden("Admin role cannot be self-assigned".to_string()));
        }

        // A token that already carries a role must agree with the requested one.
        if let Some(token_role) = caller.role() {
            if token_role != request.role {
                return Err(AuthError::Forbidden(format!(
                    "Token role {} does not match requested role {}",
                    token_role, request.role
                )));
            }
        }

        let email = request
            .email
            .or_else(|| caller.email.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::ValidationError("email is required".to_string()))?;

        debug!("Signing up {} as {}", caller.id, request.role);

        let mut batch = WriteBatch::new().create(
            USERS,
            Some(&caller.id),
            vec![
                FieldWrite::set("uid", caller.id.as_str()),
                FieldWrite::set("email", email.as_str()),
                FieldWrite::set("role", request.role.as_str()),
                FieldWrite::set("profile_completed", false),
                FieldWrite::server_timestamp("created_at"),
            ],
        );
        if request.role == Role::Doctor {
            batch = batch.create(DOCTORS, Some(&caller.id), DoctorService::registration_fields(&email));
        }

        self.store.commit(batch).await?;
        info!("User {} signed up as {}", caller.id, request.role);

        self.get_account(&caller.id).await
    }

    pub async fn get_account(&self, uid: &str) -> Result<UserAccount, AuthError> {
        let doc = self.store.get(USERS, uid).await?.ok_or(AuthError::NotFound)?;
        Ok(doc.deserialize()?)
    }
}
