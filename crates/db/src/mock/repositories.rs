use async_trait::async_trait;
use mockall::mock;
use uuid::Uuid;
use vetclinic_core::models::{
    appointment::{Appointment, AppointmentDraft},
    filter::AppointmentFilter,
};
use vetclinic_core::store::AppointmentStore;

// Mock appointment store for testing
mock! {
    pub AppointmentRepo {}

    #[async_trait]
    impl AppointmentStore for AppointmentRepo {
        async fn fetch_active_appointments(
            &self,
            veterinarian_id: Uuid,
        ) -> eyre::Result<Vec<Appointment>>;

        async fn fetch_appointment(
            &self,
            id: Uuid,
        ) -> eyre::Result<Option<Appointment>>;

        async fn persist(
            &self,
            id: Option<Uuid>,
            draft: AppointmentDraft,
        ) -> eyre::Result<Appointment>;

        async fn remove(
            &self,
            id: Uuid,
        ) -> eyre::Result<bool>;

        async fn list(
            &self,
            filter: &AppointmentFilter,
        ) -> eyre::Result<Vec<Appointment>>;
    }
}
