use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use doctor_cell::models::Doctor;
use patient_cell::models::PatientProfile;
use shared_database::collections::{DOCTORS, PATIENTS, PRESCRIPTIONS};
use shared_database::{Document, DocumentStore, FieldWrite, Query, StoreError, WriteBatch};
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{CreatePrescriptionRequest, Prescription, PrescriptionError};

pub struct PrescriptionService {
    store: Arc<dyn DocumentStore>,
}

impl PrescriptionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// An approved doctor writes a prescription for an existing patient.
    pub async fn create_prescription(
        &self,
        doctor_id: &str,
        request: CreatePrescriptionRequest,
    ) -> Result<Prescription, PrescriptionError> {
        request.validate()?;

        let doctor: Doctor = self
            .store
            .get(DOCTORS, doctor_id)
            .await?
            .ok_or_else(|| PrescriptionError::Forbidden("Doctor profile not found".to_string()))?
            .deserialize()?;
        if !doctor.is_approved() {
            warn!("Doctor {} in status {} tried to prescribe", doctor_id, doctor.status);
            return Err(PrescriptionError::Forbidden(
                "Only approved doctors can write prescriptions".to_string(),
            ));
        }

        let patient: PatientProfile = self
            .store
            .get(PATIENTS, &request.patient_id)
            .await?
            .ok_or(PrescriptionError::PatientNotFound)?
            .deserialize()?;

        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
        let medicines = serde_json::to_value(&request.medicines).map_err(StoreError::from)?;

        let fields = vec![
            FieldWrite::set("doctor_id", doctor_id),
            FieldWrite::set("doctor_name", doctor.display_name()),
            FieldWrite::set("patient_id", request.patient_id.as_str()),
            FieldWrite::set("patient_name", patient.full_name()),
            FieldWrite::set("date", date.to_string()),
            FieldWrite::set("medicines", medicines),
            FieldWrite::set("created_by", doctor_id),
            FieldWrite::server_timestamp("created_at"),
        ];

        let batch = WriteBatch::new()
            .require_exists(PATIENTS, &request.patient_id)
            .create(PRESCRIPTIONS, None, fields);
        let result = self.store.commit(batch).await.map_err(|e| match e {
            StoreError::NotFound(_) => PrescriptionError::PatientNotFound,
            other => other.into(),
        })?;

        let id = result
            .created_ids
            .first()
            .ok_or_else(|| PrescriptionError::Database("store returned no prescription id".to_string()))?;

        info!(
            "Prescription {} with {} medicines written by {} for {}",
            id,
            request.medicines.len(),
            doctor_id,
            request.patient_id
        );
        self.get_prescription(id).await
    }

    pub async fn get_prescription(&self, prescription_id: &str) -> Result<Prescription, PrescriptionError> {
        debug!("Fetching prescription: {}", prescription_id);

        Ok(self
            .store
            .get(PRESCRIPTIONS, prescription_id)
            .await?
            .ok_or(PrescriptionError::NotFound)?
            .deserialize()?)
    }

    /// The patient, the authoring doctor or an admin.
    pub async fn get_prescription_for(
        &self,
        actor: &User,
        prescription_id: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let prescription = self.get_prescription(prescription_id).await?;
        if !prescription.involves(&actor.id) && !actor.is_admin() {
            return Err(PrescriptionError::Forbidden(
                "Not authorized to view this prescription".to_string(),
            ));
        }
        Ok(prescription)
    }

    /// Visible to the patient, to any doctor and to admins.
    pub async fn list_for_patient(
        &self,
        actor: &User,
        patient_id: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        if actor.id != patient_id && !actor.has_role(Role::Doctor) && !actor.is_admin() {
            return Err(PrescriptionError::Forbidden(
                "Not authorized to view these prescriptions".to_string(),
            ));
        }

        self.list_by("patient_id", patient_id).await
    }

    pub async fn list_for_doctor(
        &self,
        actor: &User,
        doctor_id: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        if actor.id != doctor_id && !actor.is_admin() {
            return Err(PrescriptionError::Forbidden(
                "Not authorized to view these prescriptions".to_string(),
            ));
        }

        self.list_by("doctor_id", doctor_id).await
    }

    async fn list_by(&self, field: &str, value: &str) -> Result<Vec<Prescription>, PrescriptionError> {
        let query = Query::new(PRESCRIPTIONS)
            .filter_eq(field, value)
            .order_by_desc("created_at");

        to_prescriptions(self.store.query(&query).await?)
    }
}

fn to_prescriptions(docs: Vec<Document>) -> Result<Vec<Prescription>, PrescriptionError> {
    docs.iter()
        .map(|doc| doc.deserialize().map_err(PrescriptionError::from))
        .collect()
}
