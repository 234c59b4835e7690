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

use doctor_cell::models::{CredentialsRequest, DoctorStatus};
use doctor_cell::services::DoctorService;
use patient_cell::models::{PersonalInfo, RegisterProfileRequest};
use patient_cell::services::PatientService;
use prescription_cell::models::{CreatePrescriptionRequest, DoseTiming, Medicine, PrescriptionError};
use prescription_cell::router::prescription_routes;
use prescription_cell::services::PrescriptionService;
use shared_database::MemoryStore;
use shared_utils::test_utils::{test_state, TestUser};
use shared_utils::AppState;

async fn doctor(state: &AppState, store: &MemoryStore, email: &str, status: DoctorStatus) -> TestUser {
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
    if status != DoctorStatus::Waiting {
        service.set_status(&user.id, status).await.unwrap();
    }
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

fn amoxicillin() -> Medicine {
    Medicine {
        name: "Amoxicillin 500mg".to_string(),
        quantity: "15 capsules".to_string(),
        timing: DoseTiming { morning: true, afternoon: true, night: true },
        note: "After food".to_string(),
    }
}

fn request_for(patient_id: &str) -> CreatePrescriptionRequest {
    CreatePrescriptionRequest {
        patient_id: patient_id.to_string(),
        date: None,
        medicines: vec![amoxicillin()],
    }
}

async fn setup() -> (Arc<AppState>, MemoryStore, TestUser, TestUser) {
    let (state, store) = test_state();
    let doc = doctor(&state, &store, "rao@clinic.test", DoctorStatus::Approved).await;
    let pat = patient(&state, &store, "asha@example.com").await;
    (state, store, doc, pat)
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
async fn test_create_copies_names_and_defaults_date() {
    let (state, _store, doc, pat) = setup().await;
    let service = PrescriptionService::new(&state);

    let prescription = service.create_prescription(&doc.id, request_for(&pat.id)).await.unwrap();

    assert_eq!(prescription.doctor_name, "Dr. Meera Rao");
    assert_eq!(prescription.patient_name, "Asha Kumar");
    assert_eq!(prescription.created_by, doc.id);
    assert_eq!(prescription.date, chrono::Utc::now().date_naive());
    assert_eq!(prescription.medicines, vec![amoxicillin()]);
    assert!(prescription.created_at.is_some());
}

#[tokio::test]
async fn test_create_rules() {
    let (state, store, doc, pat) = setup().await;
    let service = PrescriptionService::new(&state);

    assert_matches!(
        service.create_prescription(&doc.id, request_for("ghost")).await,
        Err(PrescriptionError::PatientNotFound)
    );

    let mut empty = request_for(&pat.id);
    empty.medicines.clear();
    assert_matches!(
        service.create_prescription(&doc.id, empty).await,
        Err(PrescriptionError::ValidationError(_))
    );

    let waiting = doctor(&state, &store, "new@clinic.test", DoctorStatus::Waiting).await;
    assert_matches!(
        service.create_prescription(&waiting.id, request_for(&pat.id)).await,
        Err(PrescriptionError::Forbidden(_))
    );

    assert!(service.list_for_doctor(&doc.to_user(), &doc.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_visibility() {
    let (state, store, doc, pat) = setup().await;
    let service = PrescriptionService::new(&state);
    let other_doctor = doctor(&state, &store, "other@clinic.test", DoctorStatus::Approved).await;
    let other_patient = TestUser::patient("other@example.com");
    let admin = TestUser::admin("admin@clinic.test");

    let explicit = CreatePrescriptionRequest {
        date: NaiveDate::from_ymd_opt(2026, 3, 2),
        ..request_for(&pat.id)
    };
    let first = service.create_prescription(&doc.id, explicit).await.unwrap();
    service.create_prescription(&other_doctor.id, request_for(&pat.id)).await.unwrap();

    assert!(service.get_prescription_for(&pat.to_user(), &first.id).await.is_ok());
    assert!(service.get_prescription_for(&admin.to_user(), &first.id).await.is_ok());
    assert_matches!(
        service.get_prescription_for(&other_doctor.to_user(), &first.id).await,
        Err(PrescriptionError::Forbidden(_))
    );

    // Any doctor may see a patient's history.
    assert_eq!(service.list_for_patient(&other_doctor.to_user(), &pat.id).await.unwrap().len(), 2);
    assert_matches!(
        service.list_for_patient(&other_patient.to_user(), &pat.id).await,
        Err(PrescriptionError::Forbidden(_))
    );

    let by_doctor = service.list_for_doctor(&doc.to_user(), &doc.id).await.unwrap();
    assert_eq!(by_doctor.len(), 1);
    assert_eq!(by_doctor[0].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    assert_matches!(
        service.list_for_doctor(&other_doctor.to_user(), &doc.id).await,
        Err(PrescriptionError::Forbidden(_))
    );
}

#[tokio::test]
async fn test_routes() {
    let (state, _store, doc, pat) = setup().await;
    let app = prescription_routes(state.clone());

    let body = json!({
        "patient_id": pat.id,
        "medicines": [{ "name": "Cetirizine", "quantity": "5", "timing": { "night": true } }]
    });

    let (status, _) = send(&app, "POST", "/", &pat, Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(&app, "POST", "/", &doc, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["prescription"]["medicines"][0]["timing"]["night"], true);
    assert_eq!(created["prescription"]["medicines"][0]["timing"]["morning"], false);
    let id = created["prescription"]["id"].as_str().unwrap();

    let (status, fetched) = send(&app, "GET", &format!("/{}", id), &pat, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["patient_name"], "Asha Kumar");

    let (status, list) = send(&app, "GET", &format!("/patients/{}", pat.id), &pat, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let (status, _) = send(&app, "POST", "/", &doc, Some(json!({ "patient_id": pat.id, "medicines": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
