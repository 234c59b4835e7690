use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use doctor_cell::models::Doctor;
use patient_cell::models::PatientProfile;
use shared_database::collections::{BILLS, DOCTORS, PATIENTS};
use shared_database::{Document, DocumentStore, FieldWrite, Query, StoreError, WriteBatch};
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{Bill, BillStatus, BillingError, CreateBillRequest};

pub struct BillingService {
    store: Arc<dyn DocumentStore>,
}

impl BillingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Issue a `Pending` bill. The total is computed here from the items.
    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_bill(&self, doctor_id: &str, request: CreateBillRequest) -> Result<Bill, BillingError> {
        request.validate()?;

        let doctor: Doctor = self
            .store
            .get(DOCTORS, doctor_id)
            .await?
            .ok_or_else(|| BillingError::Forbidden("Doctor profile not found".to_string()))?
            .deserialize()?;
        if !doctor.is_approved() {
            warn!("Doctor {} in status {} tried to bill", doctor_id, doctor.status);
            return Err(BillingError::Forbidden(
                "Only approved doctors can issue bills".to_string(),
            ));
        }

        let patient: PatientProfile = self
            .store
            .get(PATIENTS, &request.patient_id)
            .await?
            .ok_or(BillingError::PatientNotFound)?
            .deserialize()?;

        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
        let items = serde_json::to_value(&request.items).map_err(StoreError::from)?;

        let fields = vec![
            FieldWrite::set("doctor_id", doctor_id),
            FieldWrite::set("doctor_name", doctor.display_name()),
            FieldWrite::set("doctor_registration_id", doctor.registration_id.clone()),
            FieldWrite::set("patient_id", request.patient_id.as_str()),
            FieldWrite::set("patient_name", patient.full_name()),
            FieldWrite::set("date", date.to_string()),
            FieldWrite::set("items", items),
            FieldWrite::set("total", request.total()),
            FieldWrite::set("status", BillStatus::Pending.as_str()),
            FieldWrite::server_timestamp("created_at"),
        ];

        let batch = WriteBatch::new()
            .require_exists(PATIENTS, &request.patient_id)
            .create(BILLS, None, fields);
        let result = self.store.commit(batch).await.map_err(|e| match e {
            StoreError::NotFound(_) => BillingError::PatientNotFound,
            other => other.into(),
        })?;

        let id = result
            .created_ids
            .first()
            .ok_or_else(|| BillingError::Database("store returned no bill id".to_string()))?;

        info!("Bill {} for {:.2} issued by {}", id, request.total(), doctor_id);
        self.get_bill(id).await
    }

    /// `Pending -> Confirmed`, only by the doctor who issued the bill.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn confirm_bill(&self, actor: &User, bill_id: &str) -> Result<Bill, BillingError> {
        let bill = self.get_bill(bill_id).await?;
        if !actor.has_role(Role::Doctor) || actor.id != bill.doctor_id {
            warn!("User {} cannot confirm bill {}", actor.id, bill_id);
            return Err(BillingError::Forbidden(
                "Only the issuing doctor can confirm this bill".to_string(),
            ));
        }

        let to = BillStatus::Confirmed;
        if bill.status != BillStatus::Pending {
            return Err(BillingError::InvalidTransition { from: bill.status, to });
        }

        let batch = WriteBatch::new()
            .require_field(BILLS, bill_id, "status", BillStatus::Pending.as_str())
            .update(
                BILLS,
                bill_id,
                vec![
                    FieldWrite::set("status", to.as_str()),
                    FieldWrite::server_timestamp("confirmed_at"),
                ],
            );

        match self.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(msg)) => {
                warn!("Confirm of bill {} lost a race: {}", bill_id, msg);
                return Err(BillingError::InvalidTransition { from: to, to });
            }
            Err(e) => return Err(e.into()),
        }

        info!("Bill {} confirmed", bill_id);
        self.get_bill(bill_id).await
    }

    pub async fn get_bill(&self, bill_id: &str) -> Result<Bill, BillingError> {
        debug!("Fetching bill: {}", bill_id);

        Ok(self
            .store
            .get(BILLS, bill_id)
            .await?
            .ok_or(BillingError::NotFound)?
            .deserialize()?)
    }

    pub async fn get_bill_for(&self, actor: &User, bill_id: &str) -> Result<Bill, BillingError> {
        let bill = self.get_bill(bill_id).await?;
        if !bill.involves(&actor.id) && !actor.is_admin() {
            return Err(BillingError::Forbidden("Not authorized to view this bill".to_string()));
        }
        Ok(bill)
    }

    /// The patient or an admin.
    pub async fn list_for_patient(&self, actor: &User, patient_id: &str) -> Result<Vec<Bill>, BillingError> {
        if actor.id != patient_id && !actor.is_admin() {
            return Err(BillingError::Forbidden("Not authorized to view these bills".to_string()));
        }
        self.list_by("patient_id", patient_id).await
    }

    /// The issuing doctor or an admin.
    pub async fn list_for_doctor(&self, actor: &User, doctor_id: &str) -> Result<Vec<Bill>, BillingError> {
        if actor.id != doctor_id && !actor.is_admin() {
            return Err(BillingError::Forbidden("Not authorized to view these bills".to_string()));
        }
        self.list_by("doctor_id", doctor_id).await
    }

    async fn list_by(&self, field: &str, value: &str) -> Result<Vec<Bill>, BillingError> {
        let query = Query::new(BILLS).filter_eq(field, value).order_by_desc("created_at");
        to_bills(self.store.query(&query).await?)
    }
}

fn to_bills(docs: Vec<Document>) -> Result<Vec<Bill>, BillingError> {
    docs.iter()
        .map(|doc| doc.deserialize().map_err(BillingError::from))
        .collect()
}
