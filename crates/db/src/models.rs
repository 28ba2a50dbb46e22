use chrono::{DateTime, Utc};
use eyre::{Report, WrapErr};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use vetclinic_core::models::appointment::Appointment;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub veterinarian_id: Uuid,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub status: String,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbAppointment> for Appointment {
    type Error = Report;

    fn try_from(row: DbAppointment) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            veterinarian_id: row.veterinarian_id,
            pet_id: row.pet_id,
            owner_id: row.owner_id,
            kind: row
                .kind
                .parse()
                .wrap_err_with(|| format!("Corrupt kind on appointment {}", row.id))?,
            status: row
                .status
                .parse()
                .wrap_err_with(|| format!("Corrupt status on appointment {}", row.id))?,
            reason: row.reason,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn into_appointments(rows: Vec<DbAppointment>) -> eyre::Result<Vec<Appointment>> {
    rows.into_iter().map(Appointment::try_from).collect()
}
