use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoctorStatus {
    Waiting,
    Approved,
    Rejected,
}

impl DoctorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorStatus::Waiting => "waiting",
            DoctorStatus::Approved => "approved",
            DoctorStatus::Rejected => "rejected",
        }
    }

    /// Statuses an admin may move a doctor to from this one.
    pub fn valid_transitions(&self) -> &'static [DoctorStatus] {
        match self {
            DoctorStatus::Waiting => &[DoctorStatus::Approved, DoctorStatus::Rejected],
            DoctorStatus::Approved => &[DoctorStatus::Waiting],
            DoctorStatus::Rejected => &[DoctorStatus::Waiting],
        }
    }

    pub fn can_transition_to(&self, next: DoctorStatus) -> bool {
        *self == next || self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub registration_id: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: Option<u32>,
    pub clinic_address: Option<String>,
    pub residential_address: Option<String>,
    pub contact: Option<String>,
    pub status: DoctorStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Doctor {
    /// Name shown to patients; falls back to the sign-up email until credentials are in.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    pub fn is_approved(&self) -> bool {
        self.status == DoctorStatus::Approved
    }

    pub fn has_credentials(&self) -> bool {
        self.registration_id.is_some() && self.specialization.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub name: String,
    pub registration_id: String,
    pub specialization: String,
    pub experience_years: u32,
    pub clinic_address: String,
    #[serde(default)]
    pub residential_address: Option<String>,
    pub contact: String,
}

impl CredentialsRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        let required = [
            ("name", &self.name),
            ("registration_id", &self.registration_id),
            ("specialization", &self.specialization),
            ("clinic_address", &self.clinic_address),
            ("contact", &self.contact),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DoctorError::ValidationError(format!("{} is required", field)));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: DoctorStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorListQuery {
    pub status: Option<DoctorStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovedDoctorsQuery {
    pub specialization: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor cannot move from {from} to {to}")]
    InvalidTransition { from: DoctorStatus, to: DoctorStatus },

    #[error("{0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for DoctorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => DoctorError::NotFound,
            StoreError::Unavailable(msg) => DoctorError::StoreUnavailable(msg),
            StoreError::PreconditionFailed(msg) => DoctorError::Database(format!("concurrent update: {}", msg)),
            other => DoctorError::Database(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppError::NotFound(e.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_workflow_transitions() {
        assert!(DoctorStatus::Waiting.can_transition_to(DoctorStatus::Approved));
        assert!(DoctorStatus::Waiting.can_transition_to(DoctorStatus::Rejected));
        assert!(DoctorStatus::Approved.can_transition_to(DoctorStatus::Waiting));
        assert!(DoctorStatus::Rejected.can_transition_to(DoctorStatus::Waiting));
        assert!(!DoctorStatus::Approved.can_transition_to(DoctorStatus::Rejected));
        assert!(!DoctorStatus::Rejected.can_transition_to(DoctorStatus::Approved));
    }

    #[test]
    fn reapplying_current_status_is_allowed() {
        for status in [DoctorStatus::Waiting, DoctorStatus::Approved, DoctorStatus::Rejected] {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn credentials_require_core_fields() {
        let mut request = CredentialsRequest {
            name: "Dr. Rao".to_string(),
            registration_id: "MCI-1001".to_string(),
            specialization: "Cardiology".to_string(),
            experience_years: 12,
            clinic_address: "12 Main St".to_string(),
            residential_address: None,
            contact: "555-0100".to_string(),
        };
        assert!(request.validate().is_ok());

        request.registration_id = "  ".to_string();
        assert_eq!(
            request.validate(),
            Err(DoctorError::ValidationError("registration_id is required".to_string()))
        );
    }
}
