//! Storage boundary of the scheduling core.

pub mod memory;

use async_trait::async_trait;
use eyre::Result;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    appointment::{Appointment, AppointmentDraft},
    filter::AppointmentFilter,
};

pub use memory::InMemoryAppointmentStore;

/// Raised by a store whose own constraints refused a write because the slot
/// is already taken. Returned inside the `eyre::Report` of [`AppointmentStore::persist`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("slot already taken for veterinarian {veterinarian_id}")]
pub struct SlotTaken {
    pub veterinarian_id: Uuid,
}

/// Raised by [`AppointmentStore::persist`] when the appointment being updated
/// no longer exists.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("appointment {id} does not exist")]
pub struct AppointmentMissing {
    pub id: Uuid,
}

/// Persistence collaborator used by the appointment manager.
///
/// Every method may fail with any error; the manager reports all of them as
/// storage being unavailable and never retries.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments of one veterinarian. Implementations may leave out
    /// inactive ones.
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> Result<Vec<Appointment>>;

    async fn fetch_appointment(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// Inserts when `id` is `None` (assigning a fresh id), otherwise
    /// overwrites the stored fields of `id`.
    ///
    /// The caller waits for the outcome without a deadline of its own, so
    /// implementations must bound the write and leave nothing applied when
    /// they return an error.
    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> Result<Appointment>;

    /// Returns whether anything was removed. Bounded like `persist`.
    async fn remove(&self, id: Uuid) -> Result<bool>;

    /// Matching appointments, most recent start first.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>>;
}
