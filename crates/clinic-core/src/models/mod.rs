//! Data models for clinic entities.
//!
//! The backend schema is owned by the server, so each model names only the
//! fields this client reads and keeps everything else in `extra`.
//!
//! - `Patient`, `Doctor`, `Specialty`: people and the specialties doctors practice
//! - `Appointment`: a scheduled visit
//! - `Notification`: dashboard notifications

pub mod appointment;
pub mod notification;
pub mod person;

pub use appointment::Appointment;
pub use notification::Notification;
pub use person::{Doctor, Patient, Specialty};

/// Join optional first/last name parts, skipping blanks
pub(crate) fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string()
}
