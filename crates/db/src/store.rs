use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use uuid::Uuid;
use vetclinic_core::models::{
    appointment::{Appointment, AppointmentDraft},
    filter::AppointmentFilter,
};
use vetclinic_core::store::AppointmentStore;

use crate::models::into_appointments;
use crate::repositories::appointment;
use crate::DbPool;

/// [`AppointmentStore`] backed by the `appointments` table.
///
/// Writes run in their own transaction under a server-side
/// `statement_timeout`, so a write that fails or runs out of time is rolled
/// back rather than left to commit later.
#[derive(Debug, Clone)]
pub struct PgAppointmentStore {
    pool: DbPool,
    write_timeout: Duration,
}

impl PgAppointmentStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = appointment::get_active_appointments_by_veterinarian(&self.pool, veterinarian_id).await?;
        into_appointments(rows)
    }

    async fn fetch_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        appointment::get_appointment_by_id(&self.pool, id)
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> Result<Appointment> {
        let mut tx = appointment::begin_bounded(&self.pool, self.write_timeout).await?;
        let row = match id {
            None => appointment::create_appointment(&mut tx, &draft).await?,
            Some(id) => appointment::update_appointment(&mut tx, id, &draft).await?,
        };
        let stored = Appointment::try_from(row)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let mut tx = appointment::begin_bounded(&self.pool, self.write_timeout).await?;
        let removed = appointment::delete_appointment(&mut tx, id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let rows = appointment::list_appointments(&self.pool, filter).await?;
        into_appointments(rows)
    }
}
