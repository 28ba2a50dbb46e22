use tracing::warn;

use crate::errors::{ClinicError, ClinicResult};
use crate::models::appointment::AppointmentStatus;

/// Statuses reachable in one step from `status`.
pub fn allowed_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;

    match status {
        Scheduled => &[Confirmed, Cancelled, NoShow],
        Confirmed => &[InProgress, Cancelled, NoShow],
        InProgress => &[Completed, Cancelled],
        Completed | Cancelled | NoShow => &[],
    }
}

pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn validate_transition(from: AppointmentStatus, to: AppointmentStatus) -> ClinicResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        warn!("Rejected status transition {} -> {}", from, to);
        Err(ClinicError::InvalidStateTransition { from, to: Some(to) })
    }
}
