use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use eyre::{Result, eyre};
use serde_json::{Value, json};
use uuid::Uuid;
use vetclinic_api::{ApiState, app};
use vetclinic_core::{
    AppointmentManager, AppointmentStore,
    models::{
        appointment::{Appointment, AppointmentDraft},
        filter::AppointmentFilter,
    },
    store::InMemoryAppointmentStore,
};

pub struct TestContext {
    pub server: TestServer,
    pub store: Arc<InMemoryAppointmentStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let server = server_over(store.clone());
        Self { server, store }
    }
}

pub fn server_over(store: Arc<dyn AppointmentStore>) -> TestServer {
    let state = Arc::new(ApiState::new(AppointmentManager::new(store)));
    TestServer::new(app(state)).expect("test server should start")
}

/// A complete booking payload for `veterinarian_id` at `start_time`.
pub fn booking(veterinarian_id: Uuid, start_time: &str, duration_minutes: i32) -> Value {
    json!({
        "start_time": start_time,
        "duration_minutes": duration_minutes,
        "veterinarian_id": veterinarian_id,
        "pet_id": Uuid::new_v4(),
        "owner_id": Uuid::new_v4(),
        "reason": "Annual checkup",
    })
}

/// Store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl AppointmentStore for BrokenStore {
    async fn fetch_active_appointments(&self, _veterinarian_id: Uuid) -> Result<Vec<Appointment>> {
        Err(eyre!("connection refused"))
    }

    async fn fetch_appointment(&self, _id: Uuid) -> Result<Option<Appointment>> {
        Err(eyre!("connection refused"))
    }

    async fn persist(&self, _id: Option<Uuid>, _draft: AppointmentDraft) -> Result<Appointment> {
        Err(eyre!("connection refused"))
    }

    async fn remove(&self, _id: Uuid) -> Result<bool> {
        Err(eyre!("connection refused"))
    }

    async fn list(&self, _filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        Err(eyre!("connection refused"))
    }
}
