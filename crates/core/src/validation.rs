//! Input checks applied before any storage access.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::{ClinicError, ClinicResult, FieldViolation};
use crate::models::appointment::{
    Appointment, AppointmentDraft, AppointmentStatus, CreateAppointmentRequest,
    DEFAULT_DURATION_MINUTES, UpdateAppointmentRequest, end_of,
};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a form timestamp. RFC 3339 input keeps its offset; naive ISO-8601
/// input is read as UTC.
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>, FieldViolation> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FieldViolation::new("start_time", format!("'{raw}' is not a valid date and time")))
}

pub fn validate_create(request: CreateAppointmentRequest) -> ClinicResult<AppointmentDraft> {
    let mut violations = Vec::new();

    if request.start_time.is_none() {
        violations.push(FieldViolation::new("start_time", "is required"));
    }
    if request.veterinarian_id.is_none() {
        violations.push(FieldViolation::new("veterinarian_id", "is required"));
    }
    if request.pet_id.is_none() {
        violations.push(FieldViolation::new("pet_id", "is required"));
    }
    if request.owner_id.is_none() {
        violations.push(FieldViolation::new("owner_id", "is required"));
    }
    let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    check_duration(duration_minutes, &mut violations);
    if let Some(start_time) = request.start_time {
        check_end(start_time, duration_minutes, &mut violations);
    }
    check_reason(&request.reason, &mut violations);

    match (request.start_time, request.veterinarian_id, request.pet_id, request.owner_id) {
        (Some(start_time), Some(veterinarian_id), Some(pet_id), Some(owner_id))
            if violations.is_empty() =>
        {
            Ok(AppointmentDraft {
                start_time,
                duration_minutes,
                veterinarian_id,
                pet_id,
                owner_id,
                kind: request.kind.unwrap_or_default(),
                status: request.status.unwrap_or(AppointmentStatus::Scheduled),
                reason: request.reason.trim().to_string(),
                notes: normalize_notes(request.notes),
            })
        }
        _ => Err(ClinicError::ValidationFailed(violations)),
    }
}

/// Overlays `request` on the stored record and validates the result.
pub fn merge_update(
    current: &Appointment,
    request: &UpdateAppointmentRequest,
) -> ClinicResult<AppointmentDraft> {
    let mut draft = current.draft();
    let mut violations = Vec::new();

    if let Some(start_time) = request.start_time {
        draft.start_time = start_time;
    }
    if let Some(duration_minutes) = request.duration_minutes {
        draft.duration_minutes = duration_minutes;
    }
    if let Some(veterinarian_id) = request.veterinarian_id {
        draft.veterinarian_id = veterinarian_id;
    }
    if let Some(pet_id) = request.pet_id {
        draft.pet_id = pet_id;
    }
    if let Some(owner_id) = request.owner_id {
        draft.owner_id = owner_id;
    }
    if let Some(kind) = request.kind {
        draft.kind = kind;
    }
    if let Some(status) = request.status {
        draft.status = status;
    }
    if let Some(reason) = &request.reason {
        draft.reason = reason.trim().to_string();
    }
    if request.notes.is_some() {
        draft.notes = normalize_notes(request.notes.clone());
    }

    check_duration(draft.duration_minutes, &mut violations);
    check_end(draft.start_time, draft.duration_minutes, &mut violations);
    check_reason(&draft.reason, &mut violations);

    if violations.is_empty() {
        Ok(draft)
    } else {
        Err(ClinicError::ValidationFailed(violations))
    }
}

fn check_duration(duration_minutes: i32, violations: &mut Vec<FieldViolation>) {
    if duration_minutes <= 0 {
        violations.push(FieldViolation::new(
            "duration_minutes",
            format!("must be a positive number of minutes, got {duration_minutes}"),
        ));
    }
}

fn check_end(start_time: DateTime<Utc>, duration_minutes: i32, violations: &mut Vec<FieldViolation>) {
    if duration_minutes > 0 && end_of(start_time, duration_minutes).is_none() {
        violations.push(FieldViolation::new(
            "start_time",
            format!("appointment starting at {start_time} would end past the supported range"),
        ));
    }
}

fn check_reason(reason: &str, violations: &mut Vec<FieldViolation>) {
    if reason.trim().is_empty() {
        violations.push(FieldViolation::new("reason", "must not be empty"));
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
