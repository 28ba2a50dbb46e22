use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Duration used when a create request leaves it out.
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// Granularities offered by the booking form. Any positive duration is accepted.
pub const SUGGESTED_DURATIONS: [i32; 6] = [15, 30, 45, 60, 90, 120];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[default]
    GeneralConsultation,
    Vaccination,
    Sterilization,
    Emergency,
    Checkup,
    Surgery,
}

impl AppointmentKind {
    pub const ALL: [AppointmentKind; 6] = [
        AppointmentKind::GeneralConsultation,
        AppointmentKind::Vaccination,
        AppointmentKind::Sterilization,
        AppointmentKind::Emergency,
        AppointmentKind::Checkup,
        AppointmentKind::Surgery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentKind::GeneralConsultation => "general_consultation",
            AppointmentKind::Vaccination => "vaccination",
            AppointmentKind::Sterilization => "sterilization",
            AppointmentKind::Emergency => "emergency",
            AppointmentKind::Checkup => "checkup",
            AppointmentKind::Surgery => "surgery",
        }
    }
}

impl fmt::Display for AppointmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "appointment kind",
                value: s.to_string(),
            })
    }
}

/// Lifecycle state of an appointment.
///
/// `Scheduled`, `Confirmed` and `InProgress` occupy the veterinarian's time;
/// `Completed`, `Cancelled` and `NoShow` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Statuses that take part in overlap checks.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn occupies_slot(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.occupies_slot()
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn can_confirm(&self) -> bool {
        *self == AppointmentStatus::Scheduled
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "appointment status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub veterinarian_id: Uuid,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Exclusive end of the slot, saturating at the latest representable instant.
    pub fn end_time(&self) -> DateTime<Utc> {
        end_of(self.start_time, self.duration_minutes).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The caller-editable part of the record.
    pub fn draft(&self) -> AppointmentDraft {
        AppointmentDraft {
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            veterinarian_id: self.veterinarian_id,
            pet_id: self.pet_id,
            owner_id: self.owner_id,
            kind: self.kind,
            status: self.status,
            reason: self.reason.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Validated appointment fields handed to storage for insert or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub veterinarian_id: Uuid,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    pub fn end_time(&self) -> DateTime<Utc> {
        end_of(self.start_time, self.duration_minutes).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether moving from `other` to `self` changes the occupied slot.
    pub fn reschedules(&self, other: &AppointmentDraft) -> bool {
        self.start_time != other.start_time
            || self.duration_minutes != other.duration_minutes
            || self.veterinarian_id != other.veterinarian_id
    }

    /// Builds the stored record once storage has assigned identity.
    pub fn into_appointment(
        self,
        id: Uuid,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Appointment {
        Appointment {
            id,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            veterinarian_id: self.veterinarian_id,
            pet_id: self.pet_id,
            owner_id: self.owner_id,
            kind: self.kind,
            status: self.status,
            reason: self.reason,
            notes: self.notes,
            created_at,
            updated_at,
        }
    }
}

pub(crate) fn end_of(start: DateTime<Utc>, duration_minutes: i32) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub veterinarian_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub kind: Option<AppointmentKind>,
    /// Initial status for imported or back-filled records. Defaults to `Scheduled`.
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub reason: String,
    pub notes: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub veterinarian_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub kind: Option<AppointmentKind>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStatusRequest {
    pub status: AppointmentStatus,
}
