use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseTiming {
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub afternoon: bool,
    #[serde(default)]
    pub night: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    /// Free text, e.g. "10 tablets".
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub timing: DoseTiming,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub patient_id: String,
    pub patient_name: String,
    pub date: NaiveDate,
    pub medicines: Vec<Medicine>,
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Prescription {
    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: String,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub medicines: Vec<Medicine>,
}

impl CreatePrescriptionRequest {
    pub fn validate(&self) -> Result<(), PrescriptionError> {
        if self.patient_id.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Select a patient".to_string()));
        }
        if self.medicines.is_empty() {
            return Err(PrescriptionError::ValidationError(
                "Add at least one medicine".to_string(),
            ));
        }
        if self.medicines.iter().any(|m| m.name.trim().is_empty()) {
            return Err(PrescriptionError::ValidationError(
                "Every medicine needs a name".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for PrescriptionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => PrescriptionError::NotFound,
            StoreError::Unavailable(msg) => PrescriptionError::StoreUnavailable(msg),
            other => PrescriptionError::Database(other.to_string()),
        }
    }
}

impl From<PrescriptionError> for AppError {
    fn from(e: PrescriptionError) -> Self {
        match e {
            PrescriptionError::NotFound | PrescriptionError::PatientNotFound => AppError::NotFound(e.to_string()),
            PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
            PrescriptionError::Forbidden(msg) => AppError::Forbidden(msg),
            PrescriptionError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            PrescriptionError::Database(msg) => AppError::Database(msg),
        }
    }
}
