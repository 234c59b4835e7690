use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use patient_cell::models::{MedicalInfo, PatientError, PersonalInfo, RegisterProfileRequest};
use patient_cell::router::patient_routes;
use patient_cell::services::PatientService;
use shared_database::collections::{PATIENTS, USERS};
use shared_database::{DocumentStore, FieldWrite, MemoryStore, WriteBatch};
use shared_utils::test_utils::{test_state, TestUser};

async fn seed_user(store: &MemoryStore, user: &TestUser) {
    store
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

fn profile_request(first_name: &str) -> RegisterProfileRequest {
    RegisterProfileRequest {
        personal_info: PersonalInfo {
            first_name: first_name.to_string(),
            last_name: "Kumar".to_string(),
            gender: "female".to_string(),
            dob: NaiveDate::from_ymd_opt(1991, 4, 12).unwrap(),
            contact: "555-0199".to_string(),
            address: "7 Hill Street".to_string(),
        },
        medical_info: MedicalInfo {
            blood_group: Some("O+".to_string()),
            allergies: vec!["penicillin".to_string()],
            ..MedicalInfo::default()
        },
        insurance: None,
    }
}

async fn send(app: Router, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", user.bearer())
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_first_registration_initialises_counters() {
    let (state, store) = test_state();
    let patient = TestUser::patient("asha@example.com");
    seed_user(&store, &patient).await;

    let profile = PatientService::new(&state)
        .register_profile(&patient.id, profile_request("Asha"))
        .await
        .unwrap();

    assert_eq!(profile.full_name(), "Asha Kumar");
    assert_eq!(profile.appointment_count, 0);
    assert_eq!(profile.pending_appointment_count, 0);
    assert!(profile.created_at.is_some());

    let user = store.get(USERS, &patient.id).await.unwrap().unwrap();
    assert_eq!(user.get("profile_completed"), Some(&json!(true)));
}

#[tokio::test]
async fn test_profile_update_keeps_counters() {
    let (state, store) = test_state();
    let patient = TestUser::patient("asha@example.com");
    seed_user(&store, &patient).await;
    let service = PatientService::new(&state);

    service.register_profile(&patient.id, profile_request("Asha")).await.unwrap();

    // Simulate two requests, one still pending.
    store
        .commit(WriteBatch::new().update(
            PATIENTS,
            &patient.id,
            vec![
                FieldWrite::increment("appointment_count", 2),
                FieldWrite::increment("pending_appointment_count", 1),
            ],
        ))
        .await
        .unwrap();

    let updated = service.register_profile(&patient.id, profile_request("Asha R")).await.unwrap();
    assert_eq!(updated.personal_info.first_name, "Asha R");
    assert_eq!(updated.appointment_count, 2);
    assert_eq!(updated.pending_appointment_count, 1);
}

#[tokio::test]
async fn test_validation_and_missing_profile() {
    let (state, store) = test_state();
    let patient = TestUser::patient("asha@example.com");
    seed_user(&store, &patient).await;
    let service = PatientService::new(&state);

    let mut request = profile_request("");
    assert_matches!(
        service.register_profile(&patient.id, request.clone()).await,
        Err(PatientError::ValidationError(_))
    );

    request.personal_info.first_name = "Asha".to_string();
    request.personal_info.dob = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap();
    assert_matches!(
        service.register_profile(&patient.id, request).await,
        Err(PatientError::InvalidDateOfBirth)
    );

    assert_matches!(service.get_profile(&patient.id).await, Err(PatientError::NotFound));
    assert!(store.is_empty(PATIENTS).await);
}

#[tokio::test]
async fn test_profile_routes_and_access() {
    let (state, store) = test_state();
    let patient = TestUser::patient("asha@example.com");
    let other = TestUser::patient("other@example.com");
    let doctor = TestUser::doctor("rao@clinic.test");
    seed_user(&store, &patient).await;

    let body = serde_json::to_value(profile_request("Asha")).unwrap();
    let (status, json) = send(patient_routes(state.clone()), "POST", "/profile", &patient, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["patient"]["pending_appointment_count"], 0);

    // Doctors cannot register patient profiles.
    let (status, _) = send(patient_routes(state.clone()), "POST", "/profile", &doctor, Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(patient_routes(state.clone()), "GET", "/profile", &patient, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["personal_info"]["first_name"], "Asha");

    let uri = format!("/{}", patient.id);
    let (status, _) = send(patient_routes(state.clone()), "GET", &uri, &doctor, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(patient_routes(state.clone()), "GET", &uri, &other, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(patient_routes(state.clone()), "GET", "/", &doctor, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    let (status, _) = send(patient_routes(state), "GET", "/", &patient, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
