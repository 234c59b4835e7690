mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use tokio::time::timeout;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use appointment_cell::services::{AppointmentBookingService, AppointmentWatch, ObservedTransition};
use shared_database::collections::PATIENTS;
use shared_database::{DocumentStore, FieldWrite};
use shared_utils::test_utils::TestUser;

use common::Clinic;

async fn next(watch: &mut AppointmentWatch) -> Vec<ObservedTransition> {
    timeout(Duration::from_secs(2), watch.next_changes())
        .await
        .expect("watch timed out")
        .expect("subscription ended")
        .expect("snapshot failed")
}

#[tokio::test]
async fn test_watch_reports_each_transition_once() {
    let clinic = Clinic::new().await;
    let service = AppointmentBookingService::new(&clinic.state);
    let existing = service.request_appointment(&clinic.patient.id, clinic.new_request(2)).await.unwrap();

    let mut watch = service.watch_doctor_appointments(&clinic.doctor.id).await.unwrap();
    assert!(next(&mut watch).await.is_empty());
    assert_eq!(watch.watcher().last_seen(&existing.id), Some(AppointmentStatus::Requested));

    service.approve(&clinic.doctor.to_user(), &existing.id).await.unwrap();
    assert_eq!(
        next(&mut watch).await,
        vec![ObservedTransition {
            appointment_id: existing.id.clone(),
            from: Some(AppointmentStatus::Requested),
            to: AppointmentStatus::Approved,
            released_pending: true,
        }]
    );

    let fresh = service.request_appointment(&clinic.patient.id, clinic.new_request(3)).await.unwrap();
    let changes = next(&mut watch).await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].appointment_id, fresh.id);
    assert_eq!(changes[0].from, None);
    assert!(!changes[0].released_pending);
}

#[tokio::test]
async fn test_watch_never_writes_counters() {
    let clinic = Clinic::new().await;
    let service = AppointmentBookingService::new(&clinic.state);
    let appointment = service.request_appointment(&clinic.patient.id, clinic.new_request(2)).await.unwrap();

    let mut doctor_watch = service.watch_doctor_appointments(&clinic.doctor.id).await.unwrap();
    let mut patient_watch = service.watch_patient_appointments(&clinic.patient.id).await.unwrap();
    next(&mut doctor_watch).await;
    next(&mut patient_watch).await;

    service.reject(&clinic.doctor.to_user(), &appointment.id).await.unwrap();
    assert_eq!(next(&mut doctor_watch).await.len(), 1);
    assert_eq!(next(&mut patient_watch).await.len(), 1);

    // Two observers, one decrement.
    assert_eq!(clinic.counters(&clinic.patient.id).await, (1, 0));
}

#[tokio::test]
async fn test_watch_fails_while_store_offline() {
    let clinic = Clinic::new().await;
    let service = AppointmentBookingService::new(&clinic.state);

    clinic.store.set_offline(true);
    assert_matches!(
        service.watch_doctor_appointments(&clinic.doctor.id).await,
        Err(AppointmentError::StoreUnavailable(_))
    );
    clinic.store.set_offline(false);
    assert!(service.watch_doctor_appointments(&clinic.doctor.id).await.is_ok());
}

#[tokio::test]
async fn test_audit_detects_and_repair_fixes_drift() {
    let clinic = Clinic::new().await;
    let service = AppointmentBookingService::new(&clinic.state);
    let first = service.request_appointment(&clinic.patient.id, clinic.new_request(2)).await.unwrap();
    service.request_appointment(&clinic.patient.id, clinic.new_request(3)).await.unwrap();
    service.approve(&clinic.doctor.to_user(), &first.id).await.unwrap();

    clinic
        .store
        .update(
            PATIENTS,
            &clinic.patient.id,
            vec![
                FieldWrite::set("appointment_count", 5),
                FieldWrite::set("pending_appointment_count", -1),
            ],
        )
        .await
        .unwrap();

    let counters = service.counters();
    let audit = counters.audit_patient_counters(&clinic.patient.id).await.unwrap();
    assert!(audit.has_drift());
    assert_eq!((audit.recorded_total, audit.recorded_pending), (5, -1));
    assert_eq!((audit.expected_total, audit.expected_pending), (2, 1));

    let repaired = counters.repair_patient_counters(&clinic.patient.id).await.unwrap();
    assert_eq!((repaired.recorded_total, repaired.recorded_pending), (2, 1));
    assert!(!repaired.has_drift());
    assert_eq!(clinic.counters(&clinic.patient.id).await, (2, 1));

    // Nothing left to fix.
    let again = counters.repair_patient_counters(&clinic.patient.id).await.unwrap();
    assert!(!again.has_drift());
}

#[tokio::test]
async fn test_repair_fills_missing_counters() {
    let clinic = Clinic::new().await;
    let legacy = TestUser::patient("legacy@example.com");
    clinic.add_patient(&legacy, "Ravi").await;
    clinic
        .store
        .update(
            PATIENTS,
            &legacy.id,
            vec![
                FieldWrite::set("appointment_count", serde_json::Value::Null),
                FieldWrite::set("pending_appointment_count", serde_json::Value::Null),
            ],
        )
        .await
        .unwrap();

    let service = AppointmentBookingService::new(&clinic.state);
    service.request_appointment(&legacy.id, clinic.new_request(1)).await.unwrap();

    // Increments treat an absent counter as zero.
    let audit = service.counters().repair_patient_counters(&legacy.id).await.unwrap();
    assert!(!audit.has_drift());
    assert_eq!(clinic.counters(&legacy.id).await, (1, 1));
}

#[tokio::test]
async fn test_audit_requires_profile() {
    let clinic = Clinic::new().await;
    let service = AppointmentBookingService::new(&clinic.state);

    assert_matches!(
        service.counters().audit_patient_counters("nobody").await,
        Err(AppointmentError::ProfileMissing)
    );
}
