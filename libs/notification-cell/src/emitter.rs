//! Notification texts for appointment transitions.
//!
//! Builders are pure; the appointment service stages the result into the
//! same batch as the transition, so a notification exists exactly when the
//! transition committed.

use chrono::NaiveDate;

use crate::models::NewNotification;

pub fn appointment_requested(doctor_id: &str, patient_name: &str) -> NewNotification {
    NewNotification {
        user_id: doctor_id.to_string(),
        title: "New Appointment Request".to_string(),
        message: format!("New appointment request from {}", patient_name),
    }
}

pub fn appointment_approved(patient_id: &str, doctor_name: &str, date: NaiveDate) -> NewNotification {
    NewNotification {
        user_id: patient_id.to_string(),
        title: "Appointment Approved".to_string(),
        message: format!("Your appointment with {} on {} has been approved", doctor_name, date),
    }
}

pub fn appointment_rejected(patient_id: &str, doctor_name: &str, date: NaiveDate) -> NewNotification {
    NewNotification {
        user_id: patient_id.to_string(),
        title: "Appointment Rejected".to_string(),
        message: format!("Your appointment with {} on {} has been rejected", doctor_name, date),
    }
}

pub fn appointment_withdrawn(doctor_id: &str, patient_name: &str, date: NaiveDate) -> NewNotification {
    NewNotification {
        user_id: doctor_id.to_string(),
        title: "Appointment Withdrawn".to_string(),
        message: format!("{} withdrew the appointment on {}", patient_name, date),
    }
}
