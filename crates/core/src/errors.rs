use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::appointment::{Appointment, AppointmentStatus};

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The existing appointment that blocked a schedule change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDetail {
    pub appointment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&Appointment> for ConflictDetail {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            start_time: appointment.start_time,
            end_time: appointment.end_time(),
        }
    }
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appointment {} [{} - {})",
            self.appointment_id,
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.end_time.format("%Y-%m-%d %H:%M")
        )
    }
}

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<FieldViolation>),

    #[error("Scheduling conflict with {0}")]
    SchedulingConflict(ConflictDetail),

    #[error("{}", describe_transition(.from, .to))]
    InvalidStateTransition {
        from: AppointmentStatus,
        /// `None` when a terminal appointment's fields were edited.
        to: Option<AppointmentStatus>,
    },

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] eyre::Report),
}

pub type ClinicResult<T> = Result<T, ClinicError>;

impl ClinicError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClinicError::ValidationFailed(vec![FieldViolation::new(field, message)])
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_transition(from: &AppointmentStatus, to: &Option<AppointmentStatus>) -> String {
    match to {
        Some(to) => format!("Invalid state transition: {from} -> {to}"),
        None => format!("Invalid state transition: appointment is {from} and can no longer be edited"),
    }
}
