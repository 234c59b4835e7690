use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillStatus {
    Pending,
    Confirmed,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "Pending",
            BillStatus::Confirmed => "Confirmed",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    #[serde(default)]
    pub doctor_registration_id: Option<String>,
    pub patient_id: String,
    pub patient_name: String,
    pub date: NaiveDate,
    pub items: Vec<BillItem>,
    pub total: f64,
    pub status: BillStatus,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Bill {
    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBillRequest {
    pub patient_id: String,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub items: Vec<BillItem>,
}

impl CreateBillRequest {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.patient_id.trim().is_empty() {
            return Err(BillingError::ValidationError("Select a patient".to_string()));
        }
        if self.items.is_empty() {
            return Err(BillingError::ValidationError("Add at least one item".to_string()));
        }
        for item in &self.items {
            if item.description.trim().is_empty() {
                return Err(BillingError::ValidationError(
                    "Every item needs a description".to_string(),
                ));
            }
            if !item.amount.is_finite() || item.amount < 0.0 {
                return Err(BillingError::ValidationError(format!(
                    "Invalid amount for {}",
                    item.description
                )));
            }
        }
        Ok(())
    }

    /// Never taken from the client.
    pub fn total(&self) -> f64 {
        self.items.iter().map(|item| item.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BillingError {
    #[error("Bill not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bill cannot move from {from} to {to}")]
    InvalidTransition { from: BillStatus, to: BillStatus },

    #[error("{0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for BillingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => BillingError::NotFound,
            StoreError::Unavailable(msg) => BillingError::StoreUnavailable(msg),
            other => BillingError::Database(other.to_string()),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::NotFound | BillingError::PatientNotFound => AppError::NotFound(e.to_string()),
            BillingError::ValidationError(msg) => AppError::ValidationError(msg),
            BillingError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            BillingError::Forbidden(msg) => AppError::Forbidden(msg),
            BillingError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            BillingError::Database(msg) => AppError::Database(msg),
        }
    }
}
