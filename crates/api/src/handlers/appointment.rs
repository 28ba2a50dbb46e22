use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;
use vetclinic_core::{
    errors::{ClinicError, FieldViolation},
    models::{
        appointment::{
            Appointment, AppointmentStatus, CreateAppointmentRequest, UpdateAppointmentRequest,
        },
        filter::AppointmentFilter,
    },
    validation::parse_start_time,
};

use crate::{ApiState, middleware::error_handling::AppError};

/// Booking form as submitted by clients. Every field is kept as raw JSON and
/// typed here, so bad input is reported field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAppointmentPayload {
    pub start_time: Option<Value>,
    pub duration_minutes: Option<Value>,
    pub veterinarian_id: Option<Value>,
    pub pet_id: Option<Value>,
    pub owner_id: Option<Value>,
    pub kind: Option<Value>,
    pub status: Option<Value>,
    pub reason: Option<Value>,
    pub notes: Option<Value>,
}

/// Partial edit; absent or `null` fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentPayload {
    pub start_time: Option<Value>,
    pub duration_minutes: Option<Value>,
    pub veterinarian_id: Option<Value>,
    pub pet_id: Option<Value>,
    pub owner_id: Option<Value>,
    pub kind: Option<Value>,
    pub status: Option<Value>,
    pub reason: Option<Value>,
    pub notes: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub status: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAppointmentsQuery {
    pub veterinarian_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Turns an unreadable body into a `body` violation instead of axum's plain
/// text rejection.
fn read_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError(ClinicError::validation("body", rejection.body_text())))
}

/// Types one raw field. `null` counts as absent.
fn typed_field<T: DeserializeOwned>(
    field: &'static str,
    raw: Option<Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<T> {
    match raw {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                violations.push(FieldViolation::new(field, err.to_string()));
                None
            }
        },
    }
}

fn parse_field<T: FromStr>(
    field: &'static str,
    raw: Option<Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let text: String = typed_field(field, raw, violations)?;
    match text.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            violations.push(FieldViolation::new(field, err.to_string()));
            None
        }
    }
}

fn parse_time(raw: Option<Value>, violations: &mut Vec<FieldViolation>) -> Option<DateTime<Utc>> {
    let text: String = typed_field("start_time", raw, violations)?;
    match parse_start_time(&text) {
        Ok(parsed) => Some(parsed),
        Err(violation) => {
            violations.push(violation);
            None
        }
    }
}

fn reject_if_any(violations: Vec<FieldViolation>) -> Result<(), AppError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError(ClinicError::ValidationFailed(violations)))
    }
}

impl TryFrom<CreateAppointmentPayload> for CreateAppointmentRequest {
    type Error = AppError;

    fn try_from(payload: CreateAppointmentPayload) -> Result<Self, Self::Error> {
        let mut violations = Vec::new();
        let request = CreateAppointmentRequest {
            start_time: parse_time(payload.start_time, &mut violations),
            duration_minutes: typed_field("duration_minutes", payload.duration_minutes, &mut violations),
            veterinarian_id: typed_field("veterinarian_id", payload.veterinarian_id, &mut violations),
            pet_id: typed_field("pet_id", payload.pet_id, &mut violations),
            owner_id: typed_field("owner_id", payload.owner_id, &mut violations),
            kind: parse_field("kind", payload.kind, &mut violations),
            status: parse_field("status", payload.status, &mut violations),
            reason: typed_field("reason", payload.reason, &mut violations).unwrap_or_default(),
            notes: typed_field("notes", payload.notes, &mut violations),
        };
        reject_if_any(violations)?;

        Ok(request)
    }
}

impl TryFrom<UpdateAppointmentPayload> for UpdateAppointmentRequest {
    type Error = AppError;

    fn try_from(payload: UpdateAppointmentPayload) -> Result<Self, Self::Error> {
        let mut violations = Vec::new();
        let request = UpdateAppointmentRequest {
            start_time: parse_time(payload.start_time, &mut violations),
            duration_minutes: typed_field("duration_minutes", payload.duration_minutes, &mut violations),
            veterinarian_id: typed_field("veterinarian_id", payload.veterinarian_id, &mut violations),
            pet_id: typed_field("pet_id", payload.pet_id, &mut violations),
            owner_id: typed_field("owner_id", payload.owner_id, &mut violations),
            kind: parse_field("kind", payload.kind, &mut violations),
            status: parse_field("status", payload.status, &mut violations),
            reason: typed_field("reason", payload.reason, &mut violations),
            notes: typed_field("notes", payload.notes, &mut violations),
        };
        reject_if_any(violations)?;

        Ok(request)
    }
}

pub async fn create_appointment(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<CreateAppointmentPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let request = CreateAppointmentRequest::try_from(read_body(payload)?)?;
    let appointment = state.manager.create(request).await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get_appointment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.manager.get(id).await?))
}

pub async fn update_appointment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateAppointmentPayload>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let request = UpdateAppointmentRequest::try_from(read_body(payload)?)?;

    Ok(Json(state.manager.update(id, request).await?))
}

pub async fn delete_appointment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.manager.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn transition_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let mut violations = Vec::new();
    let status: Option<AppointmentStatus> =
        parse_field("status", Some(read_body(payload)?.status), &mut violations);
    reject_if_any(violations)?;
    let status = status.ok_or_else(|| AppError(ClinicError::validation("status", "is required")))?;

    Ok(Json(state.manager.transition_status(id, status).await?))
}

pub async fn list_appointments(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let mut violations = Vec::new();
    let status = parse_field("status", query.status.map(Value::String), &mut violations);
    reject_if_any(violations)?;

    let mut filter = AppointmentFilter {
        veterinarian_id: query.veterinarian_id,
        owner_id: query.owner_id,
        pet_id: query.pet_id,
        status,
        ..Default::default()
    };
    if let Some(date) = query.date {
        filter = filter.on_day(date);
    }

    Ok(Json(state.manager.list(&filter).await?))
}

pub async fn list_veterinarian_appointments(
    State(state): State<Arc<ApiState>>,
    Path(veterinarian_id): Path<Uuid>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(state.manager.list_for_veterinarian(veterinarian_id).await?))
}
