use std::sync::Arc;

use tracing::{debug, info};

use shared_database::collections::{PATIENTS, USERS};
use shared_database::{DocumentStore, FieldWrite, Query, StoreError, WriteBatch};
use shared_utils::AppState;

use crate::models::{PatientError, PatientProfile, RegisterProfileRequest};

pub struct PatientService {
    store: Arc<dyn DocumentStore>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Create or overwrite the caller's profile. Counters start at zero on the
    /// first registration and are never touched by later updates.
    pub async fn register_profile(
        &self,
        uid: &str,
        request: RegisterProfileRequest,
    ) -> Result<PatientProfile, PatientError> {
        request.validate()?;
        debug!("Registering patient profile for: {}", uid);

        let profile_fields = vec![
            FieldWrite::set("personal_info", serde_json::to_value(&request.personal_info).map_err(StoreError::from)?),
            FieldWrite::set("medical_info", serde_json::to_value(&request.medical_info).map_err(StoreError::from)?),
            FieldWrite::set("insurance", serde_json::to_value(&request.insurance).map_err(StoreError::from)?),
            FieldWrite::server_timestamp("updated_at"),
        ];
        let completed = vec![FieldWrite::set("profile_completed", true)];

        let mut first_time = profile_fields.clone();
        first_time.extend([
            FieldWrite::set("appointment_count", 0),
            FieldWrite::set("pending_appointment_count", 0),
            FieldWrite::server_timestamp("created_at"),
        ]);

        let create = WriteBatch::new()
            .create(PATIENTS, Some(uid), first_time)
            .update(USERS, uid, completed.clone());

        match self.store.commit(create).await {
            Ok(_) => info!("Patient profile created for {}", uid),
            Err(StoreError::AlreadyExists(_)) => {
                let update = WriteBatch::new()
                    .update(PATIENTS, uid, profile_fields)
                    .update(USERS, uid, completed);
                self.store.commit(update).await?;
                info!("Patient profile updated for {}", uid);
            }
            Err(e) => return Err(e.into()),
        }

        self.get_profile(uid).await
    }

    pub async fn get_profile(&self, uid: &str) -> Result<PatientProfile, PatientError> {
        debug!("Fetching patient profile: {}", uid);

        let doc = self
            .store
            .get(PATIENTS, uid)
            .await?
            .ok_or(PatientError::NotFound)?;

        Ok(doc.deserialize()?)
    }

    pub async fn list_patients(&self) -> Result<Vec<PatientProfile>, PatientError> {
        let docs = self
            .store
            .query(&Query::new(PATIENTS).order_by_desc("created_at"))
            .await?;

        docs.iter()
            .map(|doc| doc.deserialize().map_err(PatientError::from))
            .collect()
    }
}
