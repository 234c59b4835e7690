#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use appointment_cell::models::{AppointmentType, NewAppointment};
use doctor_cell::models::{CredentialsRequest, DoctorStatus};
use doctor_cell::services::DoctorService;
use patient_cell::models::{PersonalInfo, RegisterProfileRequest};
use patient_cell::services::PatientService;
use shared_config::WithdrawalPolicy;
use shared_database::collections::{NOTIFICATIONS, PATIENTS, USERS};
use shared_database::{DocumentStore, FieldWrite, MemoryStore, Query};
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::AppState;

pub struct Clinic {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub doctor: TestUser,
    pub patient: TestUser,
}

impl Clinic {
    /// One approved doctor with credentials and one patient with a profile.
    pub async fn new() -> Self {
        Self::with_policy(WithdrawalPolicy::RequestedOnly).await
    }

    pub async fn with_policy(policy: WithdrawalPolicy) -> Self {
        let (state, store) = TestConfig::default().with_withdrawal_policy(policy).to_state();
        let doctor = TestUser::doctor("rao@clinic.test");
        let patient = TestUser::patient("asha@example.com");

        let clinic = Self { state, store, doctor, patient };
        clinic.add_doctor(&clinic.doctor, "Dr. Meera Rao", DoctorStatus::Approved).await;
        clinic.add_patient(&clinic.patient, "Asha").await;
        clinic
    }

    pub async fn add_user(&self, user: &TestUser) {
        self.store
            .create(
                USERS,
                Some(&user.id),
                vec![
                    FieldWrite::set("uid", user.id.as_str()),
                    FieldWrite::set("email", user.email.as_str()),
                    FieldWrite::set("role", user.role.as_str()),
                    FieldWrite::set("profile_completed", false),
                ],
            )
            .await
            .unwrap();
    }

    pub async fn add_doctor(&self, user: &TestUser, name: &str, status: DoctorStatus) {
        self.add_user(user).await;
        let service = DoctorService::new(&self.state);
        service.register_doctor(&user.id, &user.email).await.unwrap();
        service
            .submit_credentials(
                &user.id,
                CredentialsRequest {
                    name: name.to_string(),
                    registration_id: format!("REG-{}", &user.id[..8]),
                    specialization: "General Medicine".to_string(),
                    experience_years: 8,
                    clinic_address: "14 Lake Road".to_string(),
                    residential_address: None,
                    contact: "555-0142".to_string(),
                },
            )
            .await
            .unwrap();
        if status != DoctorStatus::Waiting {
            service.set_status(&user.id, status).await.unwrap();
        }
    }

    pub async fn add_patient(&self, user: &TestUser, first_name: &str) {
        self.add_user(user).await;
        PatientService::new(&self.state)
            .register_profile(
                &user.id,
                RegisterProfileRequest {
                    personal_info: PersonalInfo {
                        first_name: first_name.to_string(),
                        last_name: "Kumar".to_string(),
                        gender: "female".to_string(),
                        dob: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
                        contact: "555-0199".to_string(),
                        address: "7 Hill Street".to_string(),
                    },
                    medical_info: Default::default(),
                    insurance: None,
                },
            )
            .await
            .unwrap();
    }

    pub fn new_request(&self, days_ahead: i64) -> NewAppointment {
        NewAppointment {
            doctor_id: self.doctor.id.clone(),
            appointment_type: AppointmentType::GeneralConsultation,
            date: future_date(days_ahead),
            note: Some("Recurring headaches".to_string()),
        }
    }

    /// (appointment_count, pending_appointment_count) as stored on the profile.
    pub async fn counters(&self, patient_id: &str) -> (i64, i64) {
        let doc = self.store.get(PATIENTS, patient_id).await.unwrap().unwrap();
        (
            doc.get_i64("appointment_count").unwrap(),
            doc.get_i64("pending_appointment_count").unwrap(),
        )
    }

    pub async fn notifications_for(&self, user_id: &str) -> Vec<(String, String)> {
        self.store
            .query(&Query::new(NOTIFICATIONS).filter_eq("user_id", user_id).order_by_asc("created_at"))
            .await
            .unwrap()
            .into_iter()
            .map(|doc| {
                (
                    doc.get_str("title").unwrap_or_default().to_string(),
                    doc.get_str("message").unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

pub fn future_date(days_ahead: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days_ahead)
}
