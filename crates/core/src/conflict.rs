//! Overlap detection between a candidate appointment and a veterinarian's
//! existing bookings.
//!
//! Intervals are half-open, `[start, start + duration)`, so an appointment
//! that begins exactly when another ends does not conflict with it. Only
//! appointments whose status occupies a slot are considered.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::appointment::{Appointment, end_of};

/// `[s1, e1)` and `[s2, e2)` share at least one instant.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Returns the first existing appointment that blocks the candidate slot.
///
/// Appointments for other veterinarians, inactive ones and the one named by
/// `exclude_appointment_id` are skipped. A non-positive duration never
/// conflicts with anything. Slots running past the latest representable
/// instant are treated as ending there.
pub fn find_conflict<'a>(
    veterinarian_id: Uuid,
    candidate_start: DateTime<Utc>,
    candidate_duration_minutes: i32,
    existing_appointments: &'a [Appointment],
    exclude_appointment_id: Option<Uuid>,
) -> Option<&'a Appointment> {
    if candidate_duration_minutes <= 0 {
        return None;
    }
    let candidate_end =
        end_of(candidate_start, candidate_duration_minutes).unwrap_or(DateTime::<Utc>::MAX_UTC);

    existing_appointments.iter().find(|existing| {
        existing.veterinarian_id == veterinarian_id
            && existing.status.occupies_slot()
            && Some(existing.id) != exclude_appointment_id
            && existing.duration_minutes > 0
            && intervals_overlap(
                candidate_start,
                candidate_end,
                existing.start_time,
                existing.end_time(),
            )
    })
}

pub fn has_conflict(
    veterinarian_id: Uuid,
    candidate_start: DateTime<Utc>,
    candidate_duration_minutes: i32,
    existing_appointments: &[Appointment],
    exclude_appointment_id: Option<Uuid>,
) -> bool {
    find_conflict(
        veterinarian_id,
        candidate_start,
        candidate_duration_minutes,
        existing_appointments,
        exclude_appointment_id,
    )
    .is_some()
}
