//! # Error Handling Middleware
//!
//! Maps scheduling errors to HTTP status codes and JSON error bodies so every
//! endpoint reports failures the same way.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;
use vetclinic_core::errors::ClinicError;

/// Application error wrapper that provides HTTP status code mapping
///
/// # Example
///
/// ```
/// use axum::Json;
/// use uuid::Uuid;
/// use vetclinic_api::middleware::error_handling::AppError;
/// use vetclinic_core::errors::ClinicError;
///
/// async fn handler(id: Uuid) -> Result<Json<()>, AppError> {
///     Err(AppError(ClinicError::NotFound(id)))
/// }
/// # fn main() {}
/// ```
#[derive(Debug)]
pub struct AppError(pub ClinicError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ClinicError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::SchedulingConflict(_) => StatusCode::CONFLICT,
            ClinicError::InvalidStateTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ClinicError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();

        let body = match &self.0 {
            ClinicError::ValidationFailed(fields) => json!({ "error": message, "fields": fields }),
            ClinicError::SchedulingConflict(conflict) => json!({ "error": message, "conflict": conflict }),
            ClinicError::InvalidStateTransition { from, to } => {
                json!({ "error": message, "from": from, "to": to })
            }
            ClinicError::StorageUnavailable(report) => {
                error!("Storage unavailable: {:?}", report);
                json!({ "error": "Storage unavailable, please retry later" })
            }
            ClinicError::NotFound(_) => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Allows `?` on `ClinicResult` inside handlers.
impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        AppError(err)
    }
}
