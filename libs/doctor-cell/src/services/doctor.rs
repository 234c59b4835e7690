use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use shared_database::collections::{DOCTORS, USERS};
use shared_database::{Document, DocumentStore, FieldWrite, Query, WriteBatch};
use shared_utils::AppState;

use crate::models::{CredentialsRequest, Doctor, DoctorError, DoctorStatus};

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Fields of a freshly signed-up doctor. Callers add them to their own batch
    /// so the user record and the doctor profile land together.
    pub fn registration_fields(email: &str) -> Vec<FieldWrite> {
        vec![
            FieldWrite::set("email", email),
            FieldWrite::set("status", DoctorStatus::Waiting.as_str()),
            FieldWrite::server_timestamp("created_at"),
            FieldWrite::server_timestamp("updated_at"),
        ]
    }

    pub async fn register_doctor(&self, uid: &str, email: &str) -> Result<Doctor, DoctorError> {
        debug!("Registering doctor profile for: {}", uid);

        self.store
            .create(DOCTORS, Some(uid), Self::registration_fields(email))
            .await?;

        info!("Doctor {} registered and waiting for approval", uid);
        self.get_doctor(uid).await
    }

    /// Fill in the professional details. Status is left as is.
    #[instrument(skip(self, request))]
    pub async fn submit_credentials(
        &self,
        uid: &str,
        request: CredentialsRequest,
    ) -> Result<Doctor, DoctorError> {
        request.validate()?;

        let fields = vec![
            FieldWrite::set("name", request.name.trim()),
            FieldWrite::set("registration_id", request.registration_id.trim()),
            FieldWrite::set("specialization", request.specialization.trim()),
            FieldWrite::set("experience_years", request.experience_years),
            FieldWrite::set("clinic_address", request.clinic_address),
            FieldWrite::set(
                "residential_address",
                request.residential_address.map(Value::from).unwrap_or(Value::Null),
            ),
            FieldWrite::set("contact", request.contact),
            FieldWrite::server_timestamp("updated_at"),
        ];

        let batch = WriteBatch::new()
            .require_exists(DOCTORS, uid)
            .update(DOCTORS, uid, fields)
            .update(USERS, uid, vec![FieldWrite::set("profile_completed", true)]);

        self.store.commit(batch).await?;
        info!("Credentials submitted for doctor {}", uid);

        self.get_doctor(uid).await
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let doc = self
            .store
            .get(DOCTORS, doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)?;

        Ok(doc.deserialize()?)
    }

    pub async fn waiting_status(&self, uid: &str) -> Result<DoctorStatus, DoctorError> {
        Ok(self.get_doctor(uid).await?.status)
    }

    pub async fn list_doctors(&self, status: Option<DoctorStatus>) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors with status filter: {:?}", status);

        let mut query = Query::new(DOCTORS).order_by_desc("created_at");
        if let Some(status) = status {
            query = query.filter_eq("status", status.as_str());
        }

        let docs = self.store.query(&query).await?;
        to_doctors(docs)
    }

    /// Directory used when a patient picks a doctor. Only approved doctors appear.
    pub async fn list_approved_doctors(
        &self,
        specialization: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let query = Query::new(DOCTORS)
            .filter_eq("status", DoctorStatus::Approved.as_str())
            .order_by_asc("name");

        let doctors = to_doctors(self.store.query(&query).await?)?;

        Ok(match specialization.map(str::trim).filter(|s| !s.is_empty()) {
            Some(wanted) => doctors
                .into_iter()
                .filter(|d| {
                    d.specialization
                        .as_deref()
                        .map(|s| s.eq_ignore_ascii_case(wanted))
                        .unwrap_or(false)
                })
                .collect(),
            None => doctors,
        })
    }

    /// Admin decision on a doctor. Re-applying the current status is a no-op.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        doctor_id: &str,
        next: DoctorStatus,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;

        if doctor.status == next {
            debug!("Doctor {} already {}", doctor_id, next);
            return Ok(doctor);
        }

        if !doctor.status.can_transition_to(next) {
            warn!("Rejected doctor status change {} -> {} for {}", doctor.status, next, doctor_id);
            return Err(DoctorError::InvalidTransition {
                from: doctor.status,
                to: next,
            });
        }

        let batch = WriteBatch::new()
            .require_field(DOCTORS, doctor_id, "status", doctor.status.as_str())
            .update(
                DOCTORS,
                doctor_id,
                vec![
                    FieldWrite::set("status", next.as_str()),
                    FieldWrite::server_timestamp("updated_at"),
                ],
            );

        self.store.commit(batch).await?;
        info!("Doctor {} moved from {} to {}", doctor_id, doctor.status, next);

        self.get_doctor(doctor_id).await
    }
}

fn to_doctors(docs: Vec<Document>) -> Result<Vec<Doctor>, DoctorError> {
    docs.iter()
        .map(|doc| doc.deserialize().map_err(DoctorError::from))
        .collect()
}
