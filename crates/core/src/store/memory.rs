use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use eyre::{Report, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AppointmentMissing, AppointmentStore};
use crate::models::{
    appointment::{Appointment, AppointmentDraft},
    filter::AppointmentFilter,
};

/// Process-local store backed by a hash map.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }

    /// Every stored appointment, in no particular order.
    pub async fn snapshot(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .filter(|a| a.veterinarian_id == veterinarian_id && a.status.occupies_slot())
            .cloned()
            .collect())
    }

    async fn fetch_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> Result<Appointment> {
        let mut appointments = self.appointments.write().await;
        let now = Utc::now();

        let appointment = match id {
            None => draft.into_appointment(Uuid::new_v4(), now, None),
            Some(id) => {
                let existing = appointments
                    .get(&id)
                    .ok_or_else(|| Report::new(AppointmentMissing { id }))?;
                draft.into_appointment(id, existing.created_at, Some(now))
            }
        };

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matching)
    }
}
