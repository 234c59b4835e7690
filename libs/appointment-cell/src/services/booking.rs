// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use doctor_cell::models::{Doctor, DoctorStatus};
use notification_cell::emitter;
use patient_cell::models::PatientProfile;
use shared_database::collections::{APPOINTMENTS, DOCTORS, PATIENTS};
use shared_database::{Document, DocumentStore, FieldWrite, Query, StoreError, WriteBatch};
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus, NewAppointment,
};
use crate::services::counters::{pending_delta, CounterService};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::watcher::AppointmentWatch;

pub struct AppointmentBookingService {
    store: Arc<dyn DocumentStore>,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            lifecycle_service: AppointmentLifecycleService::new(state.config.withdrawal_policy),
        }
    }

    pub fn counters(&self) -> CounterService {
        CounterService::new(self.store.clone())
    }

    // ==========================================================================
    // REQUEST
    // ==========================================================================

    /// Patient asks an approved doctor for an appointment.
    ///
    /// The appointment, both patient counters and the doctor's notification are
    /// one commit, guarded on the doctor still being approved and the patient
    /// profile still existing.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn request_appointment(
        &self,
        patient_id: &str,
        request: NewAppointment,
    ) -> Result<Appointment, AppointmentError> {
        let today = Utc::now().date_naive();
        if request.date < today {
            return Err(AppointmentError::ValidationError(
                "Appointment date cannot be in the past".to_string(),
            ));
        }

        let doctor: Doctor = match self.store.get(DOCTORS, &request.doctor_id).await? {
            Some(doc) => doc.deserialize()?,
            None => {
                return Err(AppointmentError::ValidationError(
                    "Selected doctor does not exist".to_string(),
                ))
            }
        };
        if doctor.status != DoctorStatus::Approved {
            warn!("Request for doctor {} in status {}", doctor.id, doctor.status);
            return Err(AppointmentError::ValidationError(
                "Selected doctor is not accepting appointments".to_string(),
            ));
        }

        let patient: PatientProfile = self
            .store
            .get(PATIENTS, patient_id)
            .await?
            .ok_or(AppointmentError::ProfileMissing)?
            .deserialize()?;

        let patient_name = patient.full_name();
        let status = AppointmentStatus::Requested;

        let appointment_fields = vec![
            FieldWrite::set("patient_id", patient_id),
            FieldWrite::set("patient_name", patient_name.as_str()),
            FieldWrite::set("patient_phone", patient.personal_info.contact.as_str()),
            FieldWrite::set("doctor_id", doctor.id.as_str()),
            FieldWrite::set("doctor_name", doctor.display_name()),
            FieldWrite::set("appointment_type", request.appointment_type.as_str()),
            FieldWrite::set("date", request.date.to_string()),
            FieldWrite::set("note", request.note.unwrap_or_default()),
            FieldWrite::set("status", status.as_str()),
            FieldWrite::server_timestamp("created_at"),
        ];

        let batch = WriteBatch::new()
            .require_field(DOCTORS, &doctor.id, "status", DoctorStatus::Approved.as_str())
            .require_exists(PATIENTS, patient_id)
            .create(APPOINTMENTS, None, appointment_fields)
            .update(
                PATIENTS,
                patient_id,
                vec![
                    FieldWrite::increment("appointment_count", 1),
                    FieldWrite::increment("pending_appointment_count", pending_delta(None, status)),
                ],
            );
        let batch = emitter::appointment_requested(&doctor.id, &patient_name).stage(batch);

        let result = match self.store.commit(batch).await {
            Ok(result) => result,
            Err(e) => {
                error!("Appointment request failed for patient {}: {}", patient_id, e);
                return Err(request_commit_error(e));
            }
        };

        let appointment_id = result.created_ids.first().ok_or_else(|| {
            AppointmentError::DatabaseError("store returned no appointment id".to_string())
        })?;

        info!("Appointment {} requested by {} with {}", appointment_id, patient_id, doctor.id);
        self.get_appointment(appointment_id).await
    }

    // ==========================================================================
    // TRANSITIONS
    // ==========================================================================

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn approve(&self, actor: &User, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        self.decide(actor, appointment_id, AppointmentStatus::Approved).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn reject(&self, actor: &User, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        self.decide(actor, appointment_id, AppointmentStatus::Rejected).await
    }

    async fn decide(
        &self,
        actor: &User,
        appointment_id: &str,
        to: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_owning_doctor(actor, &appointment)?;
        self.ensure_doctor_approved(&appointment).await?;
        self.lifecycle_service.validate_status_transition(&appointment.status, &to)?;

        let notification = match to {
            AppointmentStatus::Approved => {
                emitter::appointment_approved(&appointment.patient_id, &appointment.doctor_name, appointment.date)
            }
            _ => emitter::appointment_rejected(&appointment.patient_id, &appointment.doctor_name, appointment.date),
        };

        let batch = transition_batch(&appointment, to, vec![FieldWrite::server_timestamp("updated_at")]);
        self.commit_transition(&appointment, to, notification.stage(batch)).await
    }

    /// Patient pulls back a request (or, when the policy allows, an approved appointment).
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn withdraw(&self, actor: &User, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        let to = AppointmentStatus::Withdrawn;
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_owning_patient(actor, &appointment)?;
        self.lifecycle_service.validate_status_transition(&appointment.status, &to)?;

        let notification =
            emitter::appointment_withdrawn(&appointment.doctor_id, &appointment.patient_name, appointment.date);
        let batch = transition_batch(&appointment, to, vec![FieldWrite::server_timestamp("withdrawn_at")]);

        self.commit_transition(&appointment, to, notification.stage(batch)).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn mark_completed(&self, actor: &User, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        let to = AppointmentStatus::Completed;
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_owning_doctor(actor, &appointment)?;
        self.ensure_doctor_approved(&appointment).await?;
        self.lifecycle_service.validate_status_transition(&appointment.status, &to)?;

        let batch = transition_batch(&appointment, to, vec![FieldWrite::server_timestamp("updated_at")]);
        self.commit_transition(&appointment, to, batch).await
    }

    async fn commit_transition(
        &self,
        appointment: &Appointment,
        to: AppointmentStatus,
        batch: WriteBatch,
    ) -> Result<Appointment, AppointmentError> {
        match self.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(msg)) => {
                warn!("Transition of {} to {} lost a race: {}", appointment.id, to, msg);
                if names_document_in(&msg, DOCTORS) {
                    return Err(doctor_not_approved());
                }
                // Someone else moved it first; report what it is now.
                let current = self
                    .get_appointment(&appointment.id)
                    .await
                    .map(|a| a.status)
                    .unwrap_or(appointment.status);
                return Err(AppointmentError::InvalidTransition { from: current, to });
            }
            Err(StoreError::NotFound(msg)) if names_document_in(&msg, DOCTORS) => {
                warn!("Doctor of {} disappeared during transition", appointment.id);
                return Err(doctor_not_approved());
            }
            Err(e) => {
                error!("Transition of {} to {} failed: {}", appointment.id, to, e);
                return Err(e.into());
            }
        }

        info!("Appointment {} moved {} -> {}", appointment.id, appointment.status, to);
        self.get_appointment(&appointment.id).await
    }

    async fn ensure_doctor_approved(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let status = match self.store.get(DOCTORS, &appointment.doctor_id).await? {
            Some(doc) => doc.deserialize::<Doctor>()?.status,
            None => return Err(doctor_not_approved()),
        };
        if status != DoctorStatus::Approved {
            warn!("Doctor {} in status {} tried to act on {}", appointment.doctor_id, status, appointment.id);
            return Err(doctor_not_approved());
        }
        Ok(())
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(&self, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let doc = self
            .store
            .get(APPOINTMENTS, appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        Ok(doc.deserialize()?)
    }

    /// Owning patient, owning doctor or an admin.
    pub async fn get_appointment_for(
        &self,
        actor: &User,
        appointment_id: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        if !appointment.involves(&actor.id) && !actor.is_admin() {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this appointment".to_string(),
            ));
        }
        Ok(appointment)
    }

    /// Newest first. The dashboard asks for `status=approved&limit=5`.
    pub async fn list_patient_appointments(
        &self,
        patient_id: &str,
        filter: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_by("patient_id", patient_id, filter).await
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: &str,
        filter: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_by("doctor_id", doctor_id, filter).await
    }

    async fn list_by(
        &self,
        field: &str,
        value: &str,
        filter: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query = Query::new(APPOINTMENTS)
            .filter_eq(field, value)
            .order_by_desc("created_at");
        if let Some(status) = filter.status {
            query = query.filter_eq("status", status.as_str());
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        to_appointments(self.store.query(&query).await?)
    }

    /// Live view of a doctor's appointments, reporting status changes as they land.
    pub async fn watch_doctor_appointments(&self, doctor_id: &str) -> Result<AppointmentWatch, AppointmentError> {
        let subscription = self
            .store
            .watch(Query::new(APPOINTMENTS).filter_eq("doctor_id", doctor_id))
            .await?;
        Ok(AppointmentWatch::new(subscription))
    }

    pub async fn watch_patient_appointments(&self, patient_id: &str) -> Result<AppointmentWatch, AppointmentError> {
        let subscription = self
            .store
            .watch(Query::new(APPOINTMENTS).filter_eq("patient_id", patient_id))
            .await?;
        Ok(AppointmentWatch::new(subscription))
    }
}

/// Status change guarded on the status that was read, plus the counter delta if any.
/// Doctor actions are also guarded on the doctor still being approved.
fn transition_batch(
    appointment: &Appointment,
    to: AppointmentStatus,
    mut extra: Vec<FieldWrite>,
) -> WriteBatch {
    let mut fields = vec![FieldWrite::set("status", to.as_str())];
    fields.append(&mut extra);

    let mut batch = WriteBatch::new()
        .require_field(APPOINTMENTS, &appointment.id, "status", appointment.status.as_str());
    if to != AppointmentStatus::Withdrawn {
        batch = batch.require_field(
            DOCTORS,
            &appointment.doctor_id,
            "status",
            DoctorStatus::Approved.as_str(),
        );
    }
    let batch = batch.update(APPOINTMENTS, &appointment.id, fields);

    match pending_delta(Some(appointment.status), to) {
        0 => batch,
        delta => batch.update(
            PATIENTS,
            &appointment.patient_id,
            vec![FieldWrite::increment("pending_appointment_count", delta)],
        ),
    }
}

fn ensure_owning_doctor(actor: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.has_role(Role::Doctor) && actor.id == appointment.doctor_id {
        return Ok(());
    }
    warn!("User {} is not the doctor of appointment {}", actor.id, appointment.id);
    Err(AppointmentError::Forbidden(
        "Only the assigned doctor can do this".to_string(),
    ))
}

fn doctor_not_approved() -> AppointmentError {
    AppointmentError::Forbidden("Only approved doctors can act on appointments".to_string())
}

/// Store messages name the failing document as `collection/id`.
fn names_document_in(message: &str, collection: &str) -> bool {
    message
        .strip_prefix(collection)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// The request batch is guarded on both the doctor and the patient profile.
fn request_commit_error(e: StoreError) -> AppointmentError {
    match e {
        StoreError::PreconditionFailed(_) => {
            AppointmentError::ValidationError("Selected doctor is not accepting appointments".to_string())
        }
        StoreError::NotFound(msg) if names_document_in(&msg, DOCTORS) => {
            AppointmentError::ValidationError("Selected doctor does not exist".to_string())
        }
        StoreError::NotFound(_) => AppointmentError::ProfileMissing,
        other => other.into(),
    }
}

fn ensure_owning_patient(actor: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.has_role(Role::Patient) && actor.id == appointment.patient_id {
        return Ok(());
    }
    warn!("User {} is not the patient of appointment {}", actor.id, appointment.id);
    Err(AppointmentError::Forbidden(
        "Only the patient who made the request can withdraw it".to_string(),
    ))
}

fn to_appointments(docs: Vec<Document>) -> Result<Vec<Appointment>, AppointmentError> {
    docs.iter()
        .map(|doc| doc.deserialize().map_err(AppointmentError::from))
        .collect()
}
