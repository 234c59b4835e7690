use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, Role, User};
use shared_models::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Token expired")]
    Expired,

    #[error("Token carries unknown role: {0}")]
    UnknownRole(String),

    #[error("Token carries no application role")]
    MissingRole,
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        AppError::Auth(e.to_string())
    }
}

/// Verified identity whose role must be one of the application roles.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, JwtError> {
    let user = decode_token(token, jwt_secret)?;
    if user.role.is_none() {
        debug!("Token for {} has no application role", user.id);
        return Err(JwtError::MissingRole);
    }
    Ok(user)
}

/// Verified identity that may not have picked a role yet (before signup).
/// An app role that is present but not recognised is still rejected.
pub fn decode_token(token: &str, jwt_secret: &str) -> Result<User, JwtError> {
    if jwt_secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => return Err(JwtError::Malformed),
    };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        JwtError::Malformed
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes()).map_err(|_| JwtError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        debug!("Token signature verification failed");
        JwtError::BadSignature
    })?;

    let claims_json = URL_SAFE_NO_PAD.decode(claims_b64).map_err(|_| JwtError::Malformed)?;
    let claims: JwtClaims = serde_json::from_slice(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        JwtError::InvalidClaims
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(JwtError::Expired);
        }
    }

    let role = match claims.application_role() {
        Some(raw) => Some(
            raw.parse::<Role>()
                .map_err(|_| JwtError::UnknownRole(raw.to_string()))?,
        ),
        None => None,
    };

    let user = User {
        id: claims.sub,
        email: claims.email,
        role,
        metadata: claims.user_metadata,
        created_at: claims.iat.and_then(|iat| Utc.timestamp_opt(iat as i64, 0).single()),
    };

    debug!("Token validated for user {} ({:?})", user.id, user.role);
    Ok(user)
}
