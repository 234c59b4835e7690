use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend, WithdrawalPolicy};
use shared_database::collections::USERS;
use shared_database::{DocumentStore, FieldWrite, MemoryStore, StoreError};
use shared_models::auth::{Role, User};

use crate::state::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub withdrawal_policy: WithdrawalPolicy,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            withdrawal_policy: WithdrawalPolicy::RequestedOnly,
        }
    }
}

impl TestConfig {
    pub fn with_withdrawal_policy(mut self, policy: WithdrawalPolicy) -> Self {
        self.withdrawal_policy = policy;
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store_backend: StoreBackend::Memory,
            supabase_jwt_secret: self.jwt_secret.clone(),
            withdrawal_policy: self.withdrawal_policy,
            subscription_poll_interval_ms: 50,
            ..AppConfig::default()
        }
    }

    /// Router state over a fresh in-memory store; the store handle is returned for seeding and fault injection.
    pub fn to_state(&self) -> (Arc<AppState>, MemoryStore) {
        let (state, store) = AppState::in_memory(self.to_app_config());
        (Arc::new(state), store)
    }
}

pub fn test_state() -> (Arc<AppState>, MemoryStore) {
    TestConfig::default().to_state()
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    /// Signed in but not signed up: the token carries no app role.
    pub fn unregistered(email: &str) -> Self {
        Self::new(email, "")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: self.role.parse().ok(),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Write the `users` record a signup would have created.
    pub async fn seed_user_record(&self, store: &MemoryStore) -> Result<(), StoreError> {
        store
            .create(
                USERS,
                Some(&self.id),
                vec![
                    FieldWrite::set("uid", self.id.as_str()),
                    FieldWrite::set("email", self.email.as_str()),
                    FieldWrite::set("role", self.role.as_str()),
                    FieldWrite::set("profile_completed", false),
                ],
            )
            .await
            .map(|_| ())
    }

    /// `Authorization` header value carrying a token signed with the test secret.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", JwtTestUtils::create_test_token(self, TEST_JWT_SECRET, None))
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        // Supabase puts "authenticated" in the top-level role and the application role in app_metadata.
        let app_metadata = if user.role.is_empty() {
            json!({ "provider": "email" })
        } else {
            json!({ "role": user.role })
        };
        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": app_metadata,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{decode_token, validate_token};

    #[test]
    fn test_config_creation() {
        let app_config = TestConfig::default().to_app_config();

        assert_eq!(app_config.store_backend, StoreBackend::Memory);
        assert_eq!(app_config.withdrawal_policy, WithdrawalPolicy::RequestedOnly);
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(Role::Doctor));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_token_round_trips_through_validation() {
        let user = TestUser::admin("admin@example.com");
        let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

        let validated = validate_token(&token, TEST_JWT_SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert!(validated.is_admin());
    }

    #[test]
    fn test_rejected_tokens() {
        let user = TestUser::patient("p@example.com");
        assert!(validate_token(&JwtTestUtils::create_expired_token(&user, TEST_JWT_SECRET), TEST_JWT_SECRET).is_err());
        assert!(validate_token(&JwtTestUtils::create_invalid_signature_token(&user), TEST_JWT_SECRET).is_err());
        assert!(validate_token(&JwtTestUtils::create_malformed_token(), TEST_JWT_SECRET).is_err());

        let fresh = TestUser::unregistered("new@example.com");
        let token = JwtTestUtils::create_test_token(&fresh, TEST_JWT_SECRET, None);
        assert!(validate_token(&token, TEST_JWT_SECRET).is_err());
        assert_eq!(decode_token(&token, TEST_JWT_SECRET).unwrap().role, None);
    }
}
