// libs/appointment-cell/src/services/counters.rs
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use shared_database::collections::{APPOINTMENTS, PATIENTS};
use shared_database::{DocumentStore, FieldWrite, Query, StoreError, WriteBatch};

use crate::models::{AppointmentError, AppointmentStatus, CounterAudit};

/// Change to `pending_appointment_count` caused by a transition. `from` is
/// `None` when the appointment is being created.
pub fn pending_delta(from: Option<AppointmentStatus>, to: AppointmentStatus) -> i64 {
    match (from, to) {
        (None, AppointmentStatus::Requested) => 1,
        (
            Some(AppointmentStatus::Requested),
            AppointmentStatus::Approved | AppointmentStatus::Rejected | AppointmentStatus::Withdrawn,
        ) => -1,
        _ => 0,
    }
}

/// Compares stored patient counters with the appointments collection.
pub struct CounterService {
    store: Arc<dyn DocumentStore>,
}

impl CounterService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn audit_patient_counters(&self, patient_id: &str) -> Result<CounterAudit, AppointmentError> {
        Ok(self.audit_with_recorded(patient_id).await?.0)
    }

    /// The audit plus the raw stored counter values, which may be absent on legacy profiles.
    async fn audit_with_recorded(
        &self,
        patient_id: &str,
    ) -> Result<(CounterAudit, Value, Value), AppointmentError> {
        let patient = self
            .store
            .get(PATIENTS, patient_id)
            .await?
            .ok_or(AppointmentError::ProfileMissing)?;

        let appointments = self
            .store
            .query(&Query::new(APPOINTMENTS).filter_eq("patient_id", patient_id))
            .await?;

        let expected_pending = appointments
            .iter()
            .filter(|doc| doc.get_str("status") == Some(AppointmentStatus::Requested.as_str()))
            .count() as i64;

        let audit = CounterAudit {
            patient_id: patient_id.to_string(),
            recorded_total: patient.get_i64("appointment_count").unwrap_or(0),
            recorded_pending: patient.get_i64("pending_appointment_count").unwrap_or(0),
            expected_total: appointments.len() as i64,
            expected_pending,
        };

        if audit.has_drift() {
            warn!("Counter drift for patient {}: {:?}", patient_id, audit);
        } else {
            debug!("Counters consistent for patient {}", patient_id);
        }

        let recorded_total = patient.get("appointment_count").cloned().unwrap_or(Value::Null);
        let recorded_pending = patient.get("pending_appointment_count").cloned().unwrap_or(Value::Null);
        Ok((audit, recorded_total, recorded_pending))
    }

    /// Rewrite drifted counters. The commit is guarded on the values the audit
    /// read, so a transition landing in between fails the repair.
    pub async fn repair_patient_counters(&self, patient_id: &str) -> Result<CounterAudit, AppointmentError> {
        let (audit, recorded_total, recorded_pending) = self.audit_with_recorded(patient_id).await?;
        if !audit.has_drift() {
            return Ok(audit);
        }

        let batch = WriteBatch::new()
            .require_field(PATIENTS, patient_id, "appointment_count", recorded_total)
            .require_field(PATIENTS, patient_id, "pending_appointment_count", recorded_pending)
            .update(
                PATIENTS,
                patient_id,
                vec![
                    FieldWrite::set("appointment_count", audit.expected_total),
                    FieldWrite::set("pending_appointment_count", audit.expected_pending),
                ],
            );

        match self.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(msg)) => {
                warn!("Counter repair for {} lost a race: {}", patient_id, msg);
                return Err(AppointmentError::Conflict(
                    "Counters changed during repair; audit again".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Repaired counters for patient {}: total {} -> {}, pending {} -> {}",
            patient_id, audit.recorded_total, audit.expected_total, audit.recorded_pending, audit.expected_pending
        );

        self.audit_patient_counters(patient_id).await
    }
}
