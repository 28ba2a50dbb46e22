use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use eyre::eyre;
use pretty_assertions::assert_eq;
use uuid::Uuid;
use vetclinic_core::conflict::intervals_overlap;
use vetclinic_core::errors::ClinicError;
use vetclinic_core::models::{
    appointment::{
        Appointment, AppointmentDraft, AppointmentKind, AppointmentStatus,
        CreateAppointmentRequest, UpdateAppointmentRequest,
    },
    filter::AppointmentFilter,
};
use vetclinic_core::store::{AppointmentStore, InMemoryAppointmentStore, SlotTaken};
use vetclinic_core::{AppointmentManager, ManagerConfig};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, hour, minute, 0).unwrap()
}

fn request(vet: Uuid, start: DateTime<Utc>, duration: i32) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        start_time: Some(start),
        duration_minutes: Some(duration),
        veterinarian_id: Some(vet),
        pet_id: Some(Uuid::new_v4()),
        owner_id: Some(Uuid::new_v4()),
        kind: Some(AppointmentKind::GeneralConsultation),
        status: None,
        reason: "Limping on front leg".to_string(),
        notes: None,
    }
}

fn setup() -> (Arc<InMemoryAppointmentStore>, AppointmentManager) {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let manager = AppointmentManager::new(store.clone());
    (store, manager)
}

fn assert_no_overlaps(appointments: &[Appointment]) {
    let active: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status.occupies_slot())
        .collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            assert!(
                a.veterinarian_id != b.veterinarian_id
                    || !intervals_overlap(a.start_time, a.end_time(), b.start_time, b.end_time()),
                "appointments {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
}

#[tokio::test]
async fn test_create_assigns_id_and_defaults() {
    let (store, manager) = setup();
    let vet = Uuid::new_v4();
    let mut req = request(vet, at(10, 0), 30);
    req.duration_minutes = None;
    req.kind = None;
    req.reason = "  Vaccination follow-up  ".to_string();
    req.notes = Some("   ".to_string());

    let created = manager.create(req).await.expect("create should succeed");

    assert_eq!(created.status, AppointmentStatus::Scheduled);
    assert_eq!(created.duration_minutes, 30);
    assert_eq!(created.kind, AppointmentKind::GeneralConsultation);
    assert_eq!(created.reason, "Vaccination follow-up");
    assert_eq!(created.notes, None);
    assert_eq!(manager.get(created.id).await.unwrap(), created);
    assert_eq!(store.len().await, 1);
}

#[test_log::test(tokio::test)]
async fn test_back_to_back_allowed_overlap_rejected() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();

    let first = manager.create(request(vet, at(10, 0), 30)).await.unwrap();
    manager
        .create(request(vet, at(10, 30), 30))
        .await
        .expect("back-to-back booking should be accepted");

    match manager.create(request(vet, at(10, 15), 30)).await {
        Err(ClinicError::SchedulingConflict(detail)) => {
            assert_eq!(detail.appointment_id, first.id);
            assert_eq!(detail.start_time, at(10, 0));
            assert_eq!(detail.end_time, at(10, 30));
        }
        other => panic!("expected SchedulingConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_appointment_frees_the_slot() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();

    let original = manager.create(request(vet, at(9, 0), 30)).await.unwrap();
    manager
        .transition_status(original.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    let replacement = manager.create(request(vet, at(9, 0), 30)).await;
    assert!(replacement.is_ok(), "slot should be free: {replacement:?}");
}

#[tokio::test]
async fn test_no_show_and_completed_free_the_slot() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();

    let missed = manager.create(request(vet, at(8, 0), 30)).await.unwrap();
    manager.transition_status(missed.id, AppointmentStatus::NoShow).await.unwrap();

    let done = manager.create(request(vet, at(8, 0), 30)).await.unwrap();
    for status in [
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
    ] {
        manager.transition_status(done.id, status).await.unwrap();
    }

    assert!(manager.create(request(vet, at(8, 0), 30)).await.is_ok());
}

#[tokio::test]
async fn test_different_veterinarians_never_conflict() {
    let (_, manager) = setup();

    let a = manager.create(request(Uuid::new_v4(), at(14, 0), 60)).await;
    let b = manager.create(request(Uuid::new_v4(), at(14, 0), 60)).await;

    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_create_validation_reports_all_fields() {
    let (store, manager) = setup();
    let req = CreateAppointmentRequest {
        duration_minutes: Some(0),
        reason: "   ".to_string(),
        ..Default::default()
    };

    match manager.create(req).await {
        Err(ClinicError::ValidationFailed(fields)) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field).collect();
            assert_eq!(
                names,
                vec![
                    "start_time",
                    "veterinarian_id",
                    "pet_id",
                    "owner_id",
                    "duration_minutes",
                    "reason"
                ]
            );
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_historical_import_with_terminal_status_skips_conflict_check() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();
    manager.create(request(vet, at(11, 0), 60)).await.unwrap();

    let mut past = request(vet, at(11, 0), 60);
    past.status = Some(AppointmentStatus::Completed);

    let imported = manager.create(past).await.expect("completed record should import");
    assert_eq!(imported.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_update_reschedule_checks_conflicts_excluding_itself() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();
    let morning = manager.create(request(vet, at(9, 0), 30)).await.unwrap();
    let later = manager.create(request(vet, at(10, 0), 30)).await.unwrap();

    // Extending into its own old slot is fine.
    let extended = manager
        .update(
            morning.id,
            UpdateAppointmentRequest {
                start_time: Some(at(9, 15)),
                duration_minutes: Some(45),
                ..Default::default()
            },
        )
        .await
        .expect("moving within free time should succeed");
    assert_eq!(extended.end_time(), at(10, 0));
    assert!(extended.updated_at.is_some());

    let clash = manager
        .update(
            morning.id,
            UpdateAppointmentRequest {
                duration_minutes: Some(60),
                ..Default::default()
            },
        )
        .await;
    match clash {
        Err(ClinicError::SchedulingConflict(detail)) => assert_eq!(detail.appointment_id, later.id),
        other => panic!("expected SchedulingConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_moving_to_another_veterinarian_checks_their_calendar() {
    let (_, manager) = setup();
    let (vet_a, vet_b) = (Uuid::new_v4(), Uuid::new_v4());
    let mine = manager.create(request(vet_a, at(15, 0), 30)).await.unwrap();
    let busy = manager.create(request(vet_b, at(15, 0), 30)).await.unwrap();

    let moved = manager
        .update(
            mine.id,
            UpdateAppointmentRequest {
                veterinarian_id: Some(vet_b),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(moved, Err(ClinicError::SchedulingConflict(d)) if d.appointment_id == busy.id));

    let moved = manager
        .update(
            mine.id,
            UpdateAppointmentRequest {
                veterinarian_id: Some(vet_b),
                start_time: Some(at(15, 30)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.veterinarian_id, vet_b);
}

#[tokio::test]
async fn test_update_rejects_blank_reason() {
    let (_, manager) = setup();
    let created = manager.create(request(Uuid::new_v4(), at(12, 0), 30)).await.unwrap();

    let result = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                reason: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(ClinicError::ValidationFailed(f)) if f[0].field == "reason"));
    assert_eq!(manager.get(created.id).await.unwrap().reason, created.reason);
}

#[tokio::test]
async fn test_update_status_must_follow_the_state_machine() {
    let (_, manager) = setup();
    let created = manager.create(request(Uuid::new_v4(), at(12, 0), 30)).await.unwrap();

    let skipped = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(skipped, Err(ClinicError::InvalidStateTransition { .. })));

    let confirmed = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Confirmed),
                notes: Some("Owner called to confirm".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    assert_eq!(confirmed.notes.as_deref(), Some("Owner called to confirm"));
}

#[tokio::test]
async fn test_terminal_appointments_reject_edits_but_accept_no_ops() {
    let (_, manager) = setup();
    let created = manager.create(request(Uuid::new_v4(), at(16, 0), 30)).await.unwrap();
    let cancelled = manager
        .transition_status(created.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    let edit = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                reason: Some("Different reason".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        edit,
        Err(ClinicError::InvalidStateTransition { from: AppointmentStatus::Cancelled, to: None })
    ));

    let revive = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                status: Some(AppointmentStatus::Scheduled),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        revive,
        Err(ClinicError::InvalidStateTransition {
            from: AppointmentStatus::Cancelled,
            to: Some(AppointmentStatus::Scheduled)
        })
    ));

    let unchanged = manager
        .update(
            created.id,
            UpdateAppointmentRequest {
                reason: Some(cancelled.reason.clone()),
                ..Default::default()
            },
        )
        .await
        .expect("no-op update is allowed");
    assert_eq!(unchanged, cancelled);
}

#[tokio::test]
async fn test_terminal_statuses_reject_every_transition() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();

    let paths: [&[AppointmentStatus]; 3] = [
        &[
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
        ],
        &[AppointmentStatus::Cancelled],
        &[AppointmentStatus::NoShow],
    ];

    for (i, path) in paths.iter().enumerate() {
        let created = manager
            .create(request(vet, at(8 + i as u32, 0), 30))
            .await
            .unwrap();
        for status in path.iter() {
            manager.transition_status(created.id, *status).await.unwrap();
        }
        for target in AppointmentStatus::ALL {
            let result = manager.transition_status(created.id, target).await;
            assert!(
                matches!(result, Err(ClinicError::InvalidStateTransition { .. })),
                "{:?} -> {target} should be rejected",
                path.last()
            );
        }
    }
}

#[tokio::test]
async fn test_delete_then_everything_is_not_found() {
    let (_, manager) = setup();
    let created = manager.create(request(Uuid::new_v4(), at(13, 0), 30)).await.unwrap();

    manager.delete(created.id).await.expect("delete should succeed");

    assert!(matches!(manager.get(created.id).await, Err(ClinicError::NotFound(id)) if id == created.id));
    assert!(matches!(
        manager.update(created.id, UpdateAppointmentRequest::default()).await,
        Err(ClinicError::NotFound(_))
    ));
    assert!(matches!(
        manager.transition_status(created.id, AppointmentStatus::Confirmed).await,
        Err(ClinicError::NotFound(_))
    ));
    assert!(matches!(manager.delete(created.id).await, Err(ClinicError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_ignores_status() {
    let (_, manager) = setup();
    let created = manager.create(request(Uuid::new_v4(), at(13, 0), 30)).await.unwrap();
    manager.transition_status(created.id, AppointmentStatus::NoShow).await.unwrap();

    assert!(manager.delete(created.id).await.is_ok());
}

#[tokio::test]
async fn test_sequence_of_operations_keeps_calendar_free_of_overlaps() {
    let (store, manager) = setup();
    let vets = [Uuid::new_v4(), Uuid::new_v4()];
    let mut ids = Vec::new();

    for step in 0..48u32 {
        let vet = vets[(step % 2) as usize];
        let start = at(8, 0) + chrono::Duration::minutes(i64::from((step * 25) % 480));
        let duration = [15, 30, 45, 60][(step % 4) as usize];
        if let Ok(created) = manager.create(request(vet, start, duration)).await {
            ids.push(created.id);
        }
        if step % 5 == 0 {
            if let Some(id) = ids.get((step as usize) % ids.len().max(1)) {
                let _ = manager
                    .update(
                        *id,
                        UpdateAppointmentRequest {
                            start_time: Some(start + chrono::Duration::minutes(10)),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
    }

    assert!(!ids.is_empty());
    assert_no_overlaps(&store.snapshot().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_one_slot_admit_exactly_one() {
    let (store, manager) = setup();
    let manager = Arc::new(manager);
    let vet = Uuid::new_v4();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.create(request(vet, at(10, 0), 30)).await })
        })
        .collect();

    let mut booked = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(ClinicError::SchedulingConflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(booked, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_listing_queries() {
    let (_, manager) = setup();
    let vet = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let mut first = request(vet, at(9, 0), 30);
    first.owner_id = Some(owner);
    let first = manager.create(first).await.unwrap();
    let second = manager.create(request(vet, at(11, 0), 30)).await.unwrap();
    let mut tomorrow = request(Uuid::new_v4(), at(9, 0) + chrono::Duration::days(1), 30);
    tomorrow.owner_id = Some(owner);
    let tomorrow = manager.create(tomorrow).await.unwrap();
    manager
        .transition_status(second.id, AppointmentStatus::Confirmed)
        .await
        .unwrap();

    let for_vet: Vec<Uuid> = manager
        .list_for_veterinarian(vet)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(for_vet, vec![second.id, first.id]);

    let for_owner: Vec<Uuid> = manager
        .list_for_owner(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(for_owner, vec![tomorrow.id, first.id]);

    let confirmed = manager.list_by_status(AppointmentStatus::Confirmed).await.unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, second.id);

    let day = manager
        .list_for_day(NaiveDate::from_ymd_opt(2024, 9, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(day.len(), 2);

    let filtered = manager
        .list(&AppointmentFilter::default().veterinarian(vet).owner(owner))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

/// Store whose calls never finish in time.
struct StalledStore;

#[async_trait]
impl AppointmentStore for StalledStore {
    async fn fetch_active_appointments(&self, _: Uuid) -> eyre::Result<Vec<Appointment>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn fetch_appointment(&self, _: Uuid) -> eyre::Result<Option<Appointment>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn persist(&self, _: Option<Uuid>, _: AppointmentDraft) -> eyre::Result<Appointment> {
        Err(eyre!("persist should not be reached"))
    }

    async fn remove(&self, _: Uuid) -> eyre::Result<bool> {
        Err(eyre!("connection reset by peer"))
    }

    async fn list(&self, _: &AppointmentFilter) -> eyre::Result<Vec<Appointment>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_storage_timeout_is_reported_as_unavailable() {
    let manager = AppointmentManager::with_config(
        Arc::new(StalledStore),
        ManagerConfig {
            storage_timeout: Duration::from_millis(50),
        },
    );

    let created = manager.create(request(Uuid::new_v4(), at(10, 0), 30)).await;
    assert!(matches!(created, Err(ClinicError::StorageUnavailable(ref e)) if e.to_string().contains("timed out")));

    assert!(matches!(
        manager.get(Uuid::new_v4()).await,
        Err(ClinicError::StorageUnavailable(_))
    ));
}

#[tokio::test]
async fn test_storage_failure_is_propagated_unchanged() {
    let manager = AppointmentManager::new(Arc::new(StalledStore));

    match manager.delete(Uuid::new_v4()).await {
        Err(ClinicError::StorageUnavailable(report)) => {
            assert_eq!(report.to_string(), "connection reset by peer");
        }
        other => panic!("expected StorageUnavailable, got {other:?}"),
    }
}

/// Store that refuses every insert as a double booking, the way a database
/// exclusion constraint would.
struct ConstrainedStore {
    inner: InMemoryAppointmentStore,
    blocking: Appointment,
}

#[async_trait]
impl AppointmentStore for ConstrainedStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> eyre::Result<Vec<Appointment>> {
        // Only reveals the blocker after the write was refused.
        let mut all = self.inner.fetch_active_appointments(veterinarian_id).await?;
        if self.inner.is_empty().await {
            return Ok(all);
        }
        all.push(self.blocking.clone());
        Ok(all)
    }

    async fn fetch_appointment(&self, id: Uuid) -> eyre::Result<Option<Appointment>> {
        self.inner.fetch_appointment(id).await
    }

    async fn persist(&self, _: Option<Uuid>, draft: AppointmentDraft) -> eyre::Result<Appointment> {
        let marker = draft.clone().into_appointment(Uuid::new_v4(), Utc::now(), None);
        let mut marker_draft = marker.draft();
        marker_draft.status = AppointmentStatus::Cancelled;
        self.inner.persist(None, marker_draft).await?;
        Err(eyre::Report::new(SlotTaken {
            veterinarian_id: draft.veterinarian_id,
        }))
    }

    async fn remove(&self, id: Uuid) -> eyre::Result<bool> {
        self.inner.remove(id).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> eyre::Result<Vec<Appointment>> {
        self.inner.list(filter).await
    }
}

#[tokio::test]
async fn test_store_level_double_booking_becomes_conflict() {
    let vet = Uuid::new_v4();
    let blocking = Appointment {
        id: Uuid::new_v4(),
        start_time: at(10, 0),
        duration_minutes: 60,
        veterinarian_id: vet,
        pet_id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        kind: AppointmentKind::Surgery,
        status: AppointmentStatus::Confirmed,
        reason: "Booked by another clinic terminal".to_string(),
        notes: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    let manager = AppointmentManager::new(Arc::new(ConstrainedStore {
        inner: InMemoryAppointmentStore::new(),
        blocking: blocking.clone(),
    }));

    match manager.create(request(vet, at(10, 30), 30)).await {
        Err(ClinicError::SchedulingConflict(detail)) => assert_eq!(detail.appointment_id, blocking.id),
        other => panic!("expected SchedulingConflict, got {other:?}"),
    }
}

/// Store that applies writes at once but acknowledges them late.
struct SlowAckStore {
    inner: InMemoryAppointmentStore,
    delay: Duration,
}

#[async_trait]
impl AppointmentStore for SlowAckStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> eyre::Result<Vec<Appointment>> {
        self.inner.fetch_active_appointments(veterinarian_id).await
    }

    async fn fetch_appointment(&self, id: Uuid) -> eyre::Result<Option<Appointment>> {
        self.inner.fetch_appointment(id).await
    }

    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> eyre::Result<Appointment> {
        let stored = self.inner.persist(id, draft).await?;
        tokio::time::sleep(self.delay).await;
        Ok(stored)
    }

    async fn remove(&self, id: Uuid) -> eyre::Result<bool> {
        let removed = self.inner.remove(id).await?;
        tokio::time::sleep(self.delay).await;
        Ok(removed)
    }

    async fn list(&self, filter: &AppointmentFilter) -> eyre::Result<Vec<Appointment>> {
        self.inner.list(filter).await
    }
}

#[tokio::test]
async fn test_slow_write_acknowledgement_is_not_reported_as_failure() {
    let store = Arc::new(SlowAckStore {
        inner: InMemoryAppointmentStore::new(),
        delay: Duration::from_millis(200),
    });
    let manager = AppointmentManager::with_config(
        store.clone(),
        ManagerConfig {
            storage_timeout: Duration::from_millis(50),
        },
    );

    let created = manager
        .create(request(Uuid::new_v4(), at(10, 0), 30))
        .await
        .expect("a write the store applied must be reported as applied");
    assert_eq!(store.inner.len().await, 1);

    manager.delete(created.id).await.unwrap();
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn test_slot_past_the_end_of_time_is_a_validation_error() {
    let (store, manager) = setup();
    let near_end = DateTime::<Utc>::MAX_UTC - chrono::Duration::minutes(10);

    match manager.create(request(Uuid::new_v4(), near_end, 30)).await {
        Err(ClinicError::ValidationFailed(fields)) => assert_eq!(fields[0].field, "start_time"),
        other => panic!("expected ValidationFailed, got {other:?}"),
    }

    let booked = manager.create(request(Uuid::new_v4(), at(10, 0), 30)).await.unwrap();
    let moved = manager
        .update(
            booked.id,
            UpdateAppointmentRequest {
                start_time: Some(near_end),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(moved, Err(ClinicError::ValidationFailed(_))));
    assert_eq!(store.snapshot().await, vec![booked]);
}

/// Store where the row disappears between the read and the write, as when a
/// concurrent delete lands first.
struct VanishingStore {
    inner: InMemoryAppointmentStore,
}

#[async_trait]
impl AppointmentStore for VanishingStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> eyre::Result<Vec<Appointment>> {
        self.inner.fetch_active_appointments(veterinarian_id).await
    }

    async fn fetch_appointment(&self, id: Uuid) -> eyre::Result<Option<Appointment>> {
        self.inner.fetch_appointment(id).await
    }

    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> eyre::Result<Appointment> {
        if let Some(id) = id {
            self.inner.remove(id).await?;
        }
        self.inner.persist(id, draft).await
    }

    async fn remove(&self, id: Uuid) -> eyre::Result<bool> {
        self.inner.remove(id).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> eyre::Result<Vec<Appointment>> {
        self.inner.list(filter).await
    }
}

#[tokio::test]
async fn test_update_of_concurrently_deleted_appointment_is_not_found() {
    let store = Arc::new(VanishingStore {
        inner: InMemoryAppointmentStore::new(),
    });
    let manager = AppointmentManager::new(store.clone());
    let booked = manager.create(request(Uuid::new_v4(), at(10, 0), 30)).await.unwrap();

    let result = manager
        .update(
            booked.id,
            UpdateAppointmentRequest {
                notes: Some("Fasting since midnight".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(ClinicError::NotFound(id)) if id == booked.id));
    assert!(store.inner.is_empty().await);
}

/// In-memory store that holds writes until released and counts lookups.
struct GatedStore {
    inner: InMemoryAppointmentStore,
    open: tokio::sync::watch::Sender<bool>,
    lookups: std::sync::atomic::AtomicUsize,
    write_started: tokio::sync::Notify,
}

impl GatedStore {
    fn lookups(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl AppointmentStore for GatedStore {
    async fn fetch_active_appointments(&self, veterinarian_id: Uuid) -> eyre::Result<Vec<Appointment>> {
        self.inner.fetch_active_appointments(veterinarian_id).await
    }

    async fn fetch_appointment(&self, id: Uuid) -> eyre::Result<Option<Appointment>> {
        let found = self.inner.fetch_appointment(id).await;
        self.lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        found
    }

    async fn persist(&self, id: Option<Uuid>, draft: AppointmentDraft) -> eyre::Result<Appointment> {
        self.write_started.notify_one();
        let mut gate = self.open.subscribe();
        while !*gate.borrow_and_update() {
            gate.changed().await?;
        }
        self.inner.persist(id, draft).await
    }

    async fn remove(&self, id: Uuid) -> eyre::Result<bool> {
        self.inner.remove(id).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> eyre::Result<Vec<Appointment>> {
        self.inner.list(filter).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transition_follows_appointment_moved_to_another_veterinarian() {
    let (vet_a, vet_b) = (Uuid::new_v4(), Uuid::new_v4());
    let inner = InMemoryAppointmentStore::new();
    let booked = inner
        .persist(None, validation_free_draft(vet_a))
        .await
        .unwrap();
    let store = Arc::new(GatedStore {
        inner,
        open: tokio::sync::watch::channel(false).0,
        lookups: Default::default(),
        write_started: tokio::sync::Notify::new(),
    });
    let manager = Arc::new(AppointmentManager::new(store.clone()));

    // Move the appointment to vet B; the write is held at the gate while vet A is locked.
    let mover = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .update(
                    booked.id,
                    UpdateAppointmentRequest {
                        veterinarian_id: Some(vet_b),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    store.write_started.notified().await;
    let lookups_before = store.lookups();

    // Reads vet A as the owner, then waits on vet A's lock.
    let confirmer = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .transition_status(booked.id, AppointmentStatus::Confirmed)
                .await
        })
    };
    while store.lookups() == lookups_before {
        tokio::task::yield_now().await;
    }
    store.open.send_replace(true);

    let moved = mover.await.unwrap().unwrap();
    assert_eq!(moved.veterinarian_id, vet_b);

    let confirmed = confirmer.await.unwrap().unwrap();
    assert_eq!(confirmed.veterinarian_id, vet_b);
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    // Snapshot and re-check on vet A, then both again on vet B.
    assert_eq!(store.lookups() - lookups_before, 4);
}

fn validation_free_draft(vet: Uuid) -> AppointmentDraft {
    AppointmentDraft {
        start_time: at(15, 0),
        duration_minutes: 30,
        veterinarian_id: vet,
        pet_id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        kind: AppointmentKind::Checkup,
        status: AppointmentStatus::Scheduled,
        reason: "Post-surgery check".to_string(),
        notes: None,
    }
}
