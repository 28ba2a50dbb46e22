use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route(
            "/api/appointments",
            post(handlers::appointment::create_appointment)
                .get(handlers::appointment::list_appointments),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointment::get_appointment)
                .put(handlers::appointment::update_appointment)
                .delete(handlers::appointment::delete_appointment),
        )
        .route(
            "/api/appointments/:id/status",
            post(handlers::appointment::transition_status),
        )
        .route(
            "/api/veterinarians/:id/appointments",
            get(handlers::appointment::list_veterinarian_appointments),
        )
}
