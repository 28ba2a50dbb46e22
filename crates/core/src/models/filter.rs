use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::appointment::{Appointment, AppointmentStatus};

/// Selection criteria for appointment listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub veterinarian_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Inclusive lower bound on `start_time`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `start_time`.
    pub until: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn veterinarian(mut self, id: Uuid) -> Self {
        self.veterinarian_id = Some(id);
        self
    }

    pub fn owner(mut self, id: Uuid) -> Self {
        self.owner_id = Some(id);
        self
    }

    pub fn pet(mut self, id: Uuid) -> Self {
        self.pet_id = Some(id);
        self
    }

    pub fn status(mut self, status: AppointmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to appointments starting on `date` (UTC).
    pub fn on_day(mut self, date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        self.from = Some(start);
        self.until = start.checked_add_days(Days::new(1));
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.veterinarian_id.is_none_or(|id| appointment.veterinarian_id == id)
            && self.owner_id.is_none_or(|id| appointment.owner_id == id)
            && self.pet_id.is_none_or(|id| appointment.pet_id == id)
            && self.status.is_none_or(|status| appointment.status == status)
            && self.from.is_none_or(|from| appointment.start_time >= from)
            && self.until.is_none_or(|until| appointment.start_time < until)
    }
}
