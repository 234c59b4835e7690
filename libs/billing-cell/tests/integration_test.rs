use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use billing_cell::models::{BillItem, BillStatus, BillingError, CreateBillRequest};
use billing_cell::router::billing_routes;
use billing_cell::services::BillingService;
use doctor_cell::models::{CredentialsRequest, DoctorStatus};
use doctor_cell::services::DoctorService;
use patient_cell::models::{PersonalInfo, RegisterProfileRequest};
use patient_cell::services::PatientService;
use shared_database::MemoryStore;
use shared_utils::test_utils::{test_state, TestUser};
use shared_utils::AppState;

async fn approved_doctor(state: &AppState, store: &MemoryStore, email: &str) -> TestUser {
    let user = TestUser::doctor(email);
    user.seed_user_record(store).await.unwrap();
    let service = DoctorService::new(state);
    service.register_doctor(&user.id, &user.email).await.unwrap();
    service
        .submit_credentials(
            &user.id,
            CredentialsRequest {
                name: "Dr. Meera Rao".to_string(),
                registration_id: "MCI-4471".to_string(),
                specialization: "General Medicine".to_string(),
                experience_years: 9,
                clinic_address: "14 Lake Road".to_string(),
                residential_address: None,
                contact: "555-0142".to_string(),
            },
        )
        .await
        .unwrap();
    service.set_status(&user.id, DoctorStatus::Approved).await.unwrap();
    user
}

async fn patient(state: &AppState, store: &MemoryStore, email: &str) -> TestUser {
    let user = TestUser::patient(email);
    user.seed_user_record(store).await.unwrap();
    PatientService::new(state)
        .register_profile(
            &user.id,
            RegisterProfileRequest {
                personal_info: PersonalInfo {
                    first_name: "Asha".to_string(),
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
    user
}

fn bill_request(patient_id: &str) -> CreateBillRequest {
    CreateBillRequest {
        patient_id: patient_id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 9, 14),
        items: vec![
            BillItem { description: "Consultation".to_string(), amount: 600.0 },
            BillItem { description: "ECG".to_string(), amount: 250.25 },
        ],
    }
}

async fn setup() -> (Arc<AppState>, MemoryStore, TestUser, TestUser) {
    let (state, store) = test_state();
    let doctor = approved_doctor(&state, &store, "rao@clinic.test").await;
    let patient = patient(&state, &store, "asha@example.com").await;
    (state, store, doctor, patient)
}

async fn send(app: &Router, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", user.bearer())
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_create_bill_computes_total() {
    let (state, _store, doctor, patient) = setup().await;

    let bill = BillingService::new(&state)
        .create_bill(&doctor.id, bill_request(&patient.id))
        .await
        .unwrap();

    assert_eq!(bill.total, 850.25);
    assert_eq!(bill.status, BillStatus::Pending);
    assert_eq!(bill.doctor_name, "Dr. Meera Rao");
    assert_eq!(bill.doctor_registration_id.as_deref(), Some("MCI-4471"));
    assert_eq!(bill.patient_name, "Asha Kumar");
    assert!(bill.confirmed_at.is_none());
}

#[tokio::test]
async fn test_confirm_once() {
    let (state, _store, doctor, patient) = setup().await;
    let service = BillingService::new(&state);
    let bill = service.create_bill(&doctor.id, bill_request(&patient.id)).await.unwrap();

    assert_matches!(
        service.confirm_bill(&patient.to_user(), &bill.id).await,
        Err(BillingError::Forbidden(_))
    );

    let confirmed = service.confirm_bill(&doctor.to_user(), &bill.id).await.unwrap();
    assert_eq!(confirmed.status, BillStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());

    assert_matches!(
        service.confirm_bill(&doctor.to_user(), &bill.id).await,
        Err(BillingError::InvalidTransition {
            from: BillStatus::Confirmed,
            to: BillStatus::Confirmed
        })
    );
}

#[tokio::test]
async fn test_concurrent_confirms_succeed_once() {
    let (state, _store, doctor, patient) = setup().await;
    let service = BillingService::new(&state);
    let bill = service.create_bill(&doctor.id, bill_request(&patient.id)).await.unwrap();
    let user = doctor.to_user();

    let (a, b) = tokio::join!(service.confirm_bill(&user, &bill.id), service.confirm_bill(&user, &bill.id));
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn test_create_rules() {
    let (state, store, doctor, patient) = setup().await;
    let service = BillingService::new(&state);

    assert_matches!(
        service.create_bill(&doctor.id, bill_request("ghost")).await,
        Err(BillingError::PatientNotFound)
    );

    let mut negative = bill_request(&patient.id);
    negative.items[1].amount = -5.0;
    assert_matches!(
        service.create_bill(&doctor.id, negative).await,
        Err(BillingError::ValidationError(_))
    );

    assert_matches!(
        service.create_bill(&patient.id, bill_request(&patient.id)).await,
        Err(BillingError::Forbidden(_))
    );

    store.set_offline(true);
    assert_matches!(
        service.create_bill(&doctor.id, bill_request(&patient.id)).await,
        Err(BillingError::StoreUnavailable(_))
    );
    store.set_offline(false);

    assert!(service.list_for_doctor(&doctor.to_user(), &doctor.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_routes() {
    let (state, _store, doctor, patient) = setup().await;
    let app = billing_routes(state.clone());
    let stranger = TestUser::patient("stranger@example.com");

    let body = json!({
        "patient_id": patient.id,
        "items": [
            { "description": "Consultation", "amount": 500 },
            { "description": "Dressing", "amount": 120.5 }
        ],
        "total": 1
    });

    let (status, _) = send(&app, "POST", "/", &patient, Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(&app, "POST", "/", &doctor, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["bill"]["total"], 620.5);
    assert_eq!(created["bill"]["status"], "Pending");
    let id = created["bill"]["id"].as_str().unwrap();

    let (status, _) = send(&app, "GET", &format!("/{}", id), &stranger, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, confirmed) = send(&app, "POST", &format!("/{}/confirm", id), &doctor, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["bill"]["status"], "Confirmed");

    let (status, _) = send(&app, "POST", &format!("/{}/confirm", id), &doctor, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = send(&app, "GET", &format!("/patients/{}", patient.id), &patient, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let (status, _) = send(&app, "GET", &format!("/doctors/{}", doctor.id), &patient, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
