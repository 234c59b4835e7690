use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, NaiveDate};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub dob: NaiveDate,
    pub contact: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalInfo {
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub history: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    pub provider: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: String,
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub medical_info: MedicalInfo,
    #[serde(default)]
    pub insurance: Option<Insurance>,
    /// Lifetime number of appointment requests.
    #[serde(default)]
    pub appointment_count: i64,
    /// Appointments still waiting on the doctor.
    #[serde(default)]
    pub pending_appointment_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PatientProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.personal_info.first_name, self.personal_info.last_name)
    }

    pub fn age(&self) -> i32 {
        let today = Utc::now().date_naive();
        today.years_since(self.personal_info.dob).unwrap_or(0) as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProfileRequest {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub medical_info: MedicalInfo,
    #[serde(default)]
    pub insurance: Option<Insurance>,
}

impl RegisterProfileRequest {
    pub fn validate(&self) -> Result<(), PatientError> {
        let info = &self.personal_info;
        for (field, value) in [
            ("first_name", &info.first_name),
            ("last_name", &info.last_name),
            ("contact", &info.contact),
        ] {
            if value.trim().is_empty() {
                return Err(PatientError::ValidationError(format!("{} is required", field)));
            }
        }

        if info.dob > Utc::now().date_naive() {
            return Err(PatientError::InvalidDateOfBirth);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Invalid date of birth")]
    InvalidDateOfBirth,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for PatientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => PatientError::NotFound,
            StoreError::Unavailable(msg) => PatientError::StoreUnavailable(msg),
            other => PatientError::DatabaseError(other.to_string()),
        }
    }
}

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound(e.to_string()),
            PatientError::InvalidDateOfBirth => AppError::ValidationError(e.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(e.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
