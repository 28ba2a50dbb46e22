//! # Appointment Lifecycle Manager
//!
//! Validates and applies every change to an appointment. Schedule changes for
//! one veterinarian are serialized through [`VeterinarianLocks`] so the
//! conflict check and the write that follows it see a consistent calendar.
//! All durable state lives in the [`AppointmentStore`]. Reads are bounded by
//! [`ManagerConfig::storage_timeout`]. Writes are never abandoned here: the
//! store bounds them itself and either applies them or reports failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use eyre::eyre;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict;
use crate::errors::{ClinicError, ClinicResult, ConflictDetail};
use crate::lifecycle;
use crate::locks::{VeterinarianGuard, VeterinarianLocks};
use crate::models::{
    appointment::{
        Appointment, AppointmentDraft, AppointmentStatus, CreateAppointmentRequest,
        UpdateAppointmentRequest,
    },
    filter::AppointmentFilter,
};
use crate::store::{AppointmentMissing, AppointmentStore, SlotTaken};
use crate::validation;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Upper bound for a single storage read.
    pub storage_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(5),
        }
    }
}

pub struct AppointmentManager {
    store: Arc<dyn AppointmentStore>,
    locks: VeterinarianLocks,
    config: ManagerConfig,
}

impl AppointmentManager {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn AppointmentStore>, config: ManagerConfig) -> Self {
        Self {
            store,
            locks: VeterinarianLocks::new(),
            config,
        }
    }

    /// Books a new appointment.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` when required fields are missing, the duration is
    ///   not positive or the reason is blank. Nothing is written.
    /// - `SchedulingConflict` when the veterinarian already has an active
    ///   appointment overlapping the requested slot.
    /// - `StorageUnavailable` when the store fails or times out.
    pub async fn create(&self, request: CreateAppointmentRequest) -> ClinicResult<Appointment> {
        let draft = validation::validate_create(request)?;
        let _guard = self.locks.acquire(draft.veterinarian_id).await;

        if draft.status.occupies_slot() {
            self.ensure_slot_free(&draft, None).await?;
        }

        let appointment = self.write(None, draft).await?;
        info!(
            "Appointment {} booked for veterinarian {} at {} ({} min)",
            appointment.id,
            appointment.veterinarian_id,
            appointment.start_time,
            appointment.duration_minutes
        );
        Ok(appointment)
    }

    /// Applies a partial update. Changing the start, the duration or the
    /// veterinarian re-checks the target calendar, ignoring the appointment
    /// itself. Terminal appointments only accept no-op updates.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> ClinicResult<Appointment> {
        let (current, _guards) = self.lock_appointment(id, request.veterinarian_id).await?;
        let merged = validation::merge_update(&current, &request)?;

        if merged == current.draft() {
            debug!("Update of appointment {} changes nothing", id);
            return Ok(current);
        }
        if current.status.is_terminal() {
            warn!("Refusing to edit appointment {} in terminal status {}", id, current.status);
            return Err(ClinicError::InvalidStateTransition {
                from: current.status,
                to: (merged.status != current.status).then_some(merged.status),
            });
        }
        if merged.status != current.status {
            lifecycle::validate_transition(current.status, merged.status)?;
        }
        if merged.reschedules(&current.draft()) && merged.status.occupies_slot() {
            self.ensure_slot_free(&merged, Some(id)).await?;
        }

        let appointment = self.write(Some(id), merged).await?;
        info!("Appointment {} updated", id);
        Ok(appointment)
    }

    /// Hard-deletes an appointment whatever its status.
    pub async fn delete(&self, id: Uuid) -> ClinicResult<()> {
        let removed = self
            .store
            .remove(id)
            .await
            .map_err(ClinicError::StorageUnavailable)?;
        if removed {
            info!("Appointment {} deleted", id);
            Ok(())
        } else {
            Err(ClinicError::NotFound(id))
        }
    }

    /// Moves an appointment along one edge of the lifecycle.
    pub async fn transition_status(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> ClinicResult<Appointment> {
        let (current, _guards) = self.lock_appointment(id, None).await?;
        lifecycle::validate_transition(current.status, new_status)?;

        let mut draft = current.draft();
        draft.status = new_status;
        let appointment = self.write(Some(id), draft).await?;
        info!("Appointment {} moved {} -> {}", id, current.status, new_status);
        Ok(appointment)
    }

    pub async fn get(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.fetch_existing(id).await
    }

    pub async fn list(&self, filter: &AppointmentFilter) -> ClinicResult<Vec<Appointment>> {
        debug!("Listing appointments with {:?}", filter);
        self.call(self.store.list(filter)).await
    }

    pub async fn list_for_veterinarian(&self, veterinarian_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.list(&AppointmentFilter::default().veterinarian(veterinarian_id)).await
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> ClinicResult<Vec<Appointment>> {
        self.list(&AppointmentFilter::default().owner(owner_id)).await
    }

    pub async fn list_by_status(&self, status: AppointmentStatus) -> ClinicResult<Vec<Appointment>> {
        self.list(&AppointmentFilter::default().status(status)).await
    }

    pub async fn list_for_day(&self, date: NaiveDate) -> ClinicResult<Vec<Appointment>> {
        self.list(&AppointmentFilter::default().on_day(date)).await
    }

    /// Loads `id` and holds the locks of its veterinarian (and of
    /// `target_veterinarian` if given). Retries when the appointment was moved
    /// to another veterinarian while waiting for the lock.
    async fn lock_appointment(
        &self,
        id: Uuid,
        target_veterinarian: Option<Uuid>,
    ) -> ClinicResult<(Appointment, Vec<VeterinarianGuard<'_>>)> {
        loop {
            let snapshot = self.fetch_existing(id).await?;
            let mut ids = vec![snapshot.veterinarian_id];
            ids.extend(target_veterinarian);
            let guards = self.locks.acquire_all(&ids).await;

            let current = self.fetch_existing(id).await?;
            if current.veterinarian_id == snapshot.veterinarian_id {
                return Ok((current, guards));
            }
            debug!("Appointment {} changed veterinarian while waiting, retrying", id);
        }
    }

    async fn fetch_existing(&self, id: Uuid) -> ClinicResult<Appointment> {
        self.call(self.store.fetch_appointment(id))
            .await?
            .ok_or(ClinicError::NotFound(id))
    }

    async fn ensure_slot_free(
        &self,
        draft: &AppointmentDraft,
        exclude: Option<Uuid>,
    ) -> ClinicResult<()> {
        let existing = self
            .call(self.store.fetch_active_appointments(draft.veterinarian_id))
            .await?;

        match conflict::find_conflict(
            draft.veterinarian_id,
            draft.start_time,
            draft.duration_minutes,
            &existing,
            exclude,
        ) {
            Some(blocking) => {
                warn!(
                    "Veterinarian {} is not available at {}: overlaps appointment {}",
                    draft.veterinarian_id, draft.start_time, blocking.id
                );
                Err(ClinicError::SchedulingConflict(ConflictDetail::from(blocking)))
            }
            None => Ok(()),
        }
    }

    /// Persists `draft`, translating a store-level double-booking refusal
    /// into a conflict that names the blocking appointment, and a vanished
    /// row into `NotFound`.
    async fn write(&self, id: Option<Uuid>, draft: AppointmentDraft) -> ClinicResult<Appointment> {
        let veterinarian_id = draft.veterinarian_id;
        let (start_time, duration_minutes) = (draft.start_time, draft.duration_minutes);

        let report = match self.store.persist(id, draft).await {
            Ok(appointment) => return Ok(appointment),
            Err(report) => report,
        };

        if let Some(missing) = report.downcast_ref::<AppointmentMissing>() {
            warn!("Appointment {} was removed before the write landed", missing.id);
            return Err(ClinicError::NotFound(missing.id));
        }
        if report.downcast_ref::<SlotTaken>().is_some() {
            let existing = self
                .call(self.store.fetch_active_appointments(veterinarian_id))
                .await?;
            if let Some(blocking) =
                conflict::find_conflict(veterinarian_id, start_time, duration_minutes, &existing, id)
            {
                return Err(ClinicError::SchedulingConflict(ConflictDetail::from(blocking)));
            }
        }
        Err(ClinicError::StorageUnavailable(report))
    }

    async fn call<T>(&self, operation: impl Future<Output = eyre::Result<T>>) -> ClinicResult<T> {
        match tokio::time::timeout(self.config.storage_timeout, operation).await {
            Ok(result) => result.map_err(ClinicError::StorageUnavailable),
            Err(_) => Err(ClinicError::StorageUnavailable(eyre!(
                "storage call timed out after {:?}",
                self.config.storage_timeout
            ))),
        }
    }
}
