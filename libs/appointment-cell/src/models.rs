// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub patient_phone: Option<String>,
    pub doctor_id: String,
    pub doctor_name: String,
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: String,
    pub status: AppointmentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn is_pending(&self) -> bool {
        self.status == AppointmentStatus::Requested
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Requested,
    Approved,
    Rejected,
    Withdrawn,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Withdrawn,
        AppointmentStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "requested",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Withdrawn => "withdrawn",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Withdrawn | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppointmentError::ValidationError(format!("Unknown appointment status: {}", s)))
    }
}

/// Persisted with the display strings the booking form uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentType {
    #[serde(rename = "General Consultation")]
    GeneralConsultation,
    #[serde(rename = "Follow-up")]
    FollowUp,
    #[serde(rename = "Emergency")]
    Emergency,
    #[serde(rename = "Lab Test Review")]
    LabTestReview,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 4] = [
        AppointmentType::GeneralConsultation,
        AppointmentType::FollowUp,
        AppointmentType::Emergency,
        AppointmentType::LabTestReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::GeneralConsultation => "General Consultation",
            AppointmentType::FollowUp => "Follow-up",
            AppointmentType::Emergency => "Emergency",
            AppointmentType::LabTestReview => "Lab Test Review",
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| AppointmentError::ValidationError(format!("Unknown appointment type: {}", s)))
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// A validated appointment request.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub doctor_id: String,
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// Booking form body. Type and date arrive as text and are checked in `parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAppointmentBody {
    pub doctor_id: String,
    pub appointment_type: String,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl RequestAppointmentBody {
    pub fn parse(self) -> Result<NewAppointment, AppointmentError> {
        if self.doctor_id.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Please select a doctor".to_string()));
        }

        let appointment_type = self.appointment_type.parse()?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            AppointmentError::ValidationError(format!("Invalid appointment date: {}", self.date))
        })?;

        Ok(NewAppointment {
            doctor_id: self.doctor_id,
            appointment_type,
            date,
            note: self.note,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<usize>,
}

/// Counters stored on the patient profile next to what the appointments say they should be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterAudit {
    pub patient_id: String,
    pub recorded_total: i64,
    pub recorded_pending: i64,
    pub expected_total: i64,
    pub expected_pending: i64,
}

impl CounterAudit {
    pub fn has_drift(&self) -> bool {
        self.recorded_total != self.expected_total || self.recorded_pending != self.expected_pending
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Please complete your patient profile before requesting an appointment")]
    ProfileMissing,

    #[error("{0}")]
    Forbidden(String),

    #[error("Concurrent update: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Unavailable(msg) => AppointmentError::StoreUnavailable(msg),
            StoreError::PreconditionFailed(msg) => AppointmentError::Conflict(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound(e.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            AppointmentError::ProfileMissing => AppError::BadRequest(e.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
