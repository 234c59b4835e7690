//! Collection names shared by every cell.

pub const USERS: &str = "users";
pub const PATIENTS: &str = "patients";
pub const DOCTORS: &str = "doctors";
pub const APPOINTMENTS: &str = "appointments";
pub const NOTIFICATIONS: &str = "notifications";
pub const PRESCRIPTIONS: &str = "prescriptions";
pub const BILLS: &str = "bills";
