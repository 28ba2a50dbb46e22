use crate::models::DbAppointment;
use crate::schema::NO_DOUBLE_BOOKING;
use std::time::Duration;

use chrono::Utc;
use eyre::{Report, Result};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;
use vetclinic_core::models::{
    appointment::{AppointmentDraft, AppointmentStatus},
    filter::AppointmentFilter,
};
use vetclinic_core::store::{AppointmentMissing, SlotTaken};

const COLUMNS: &str = "id, start_time, end_time, duration_minutes, veterinarian_id, pet_id, \
                       owner_id, kind, status, reason, notes, created_at, updated_at";

/// Postgres SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

/// Opens a transaction whose statements are cancelled by the server after
/// `timeout`. Dropping it without `commit` rolls everything back.
pub async fn begin_bounded(pool: &Pool<Postgres>, timeout: Duration) -> Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT set_config('statement_timeout', $1, true)")
        .bind(format!("{}ms", timeout.as_millis().max(1)))
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

pub async fn create_appointment(conn: &mut PgConnection, draft: &AppointmentDraft) -> Result<DbAppointment> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    tracing::debug!(
        "Creating appointment: id={}, veterinarian={}, start={}, duration={}",
        id, draft.veterinarian_id, draft.start_time, draft.duration_minutes
    );

    let appointment = sqlx::query_as::<_, DbAppointment>(&format!(
        r#"
        INSERT INTO appointments (id, start_time, end_time, duration_minutes, veterinarian_id,
                                  pet_id, owner_id, kind, status, reason, notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(draft.start_time)
    .bind(draft.end_time())
    .bind(draft.duration_minutes)
    .bind(draft.veterinarian_id)
    .bind(draft.pet_id)
    .bind(draft.owner_id)
    .bind(draft.kind.as_str())
    .bind(draft.status.as_str())
    .bind(&draft.reason)
    .bind(&draft.notes)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| write_error(e, draft))?;

    Ok(appointment)
}

pub async fn update_appointment(
    conn: &mut PgConnection,
    id: Uuid,
    draft: &AppointmentDraft,
) -> Result<DbAppointment> {
    let updated = sqlx::query_as::<_, DbAppointment>(&format!(
        r#"
        UPDATE appointments
        SET start_time = $2, end_time = $3, duration_minutes = $4, veterinarian_id = $5,
            pet_id = $6, owner_id = $7, kind = $8, status = $9, reason = $10, notes = $11,
            updated_at = $12
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(draft.start_time)
    .bind(draft.end_time())
    .bind(draft.duration_minutes)
    .bind(draft.veterinarian_id)
    .bind(draft.pet_id)
    .bind(draft.owner_id)
    .bind(draft.kind.as_str())
    .bind(draft.status.as_str())
    .bind(&draft.reason)
    .bind(&draft.notes)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await
    .map_err(|e| write_error(e, draft))?;

    updated.ok_or_else(|| Report::new(AppointmentMissing { id }))
}

pub async fn get_appointment_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<DbAppointment>> {
    tracing::debug!("Getting appointment by id: {}", id);

    let appointment = sqlx::query_as::<_, DbAppointment>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM appointments
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(appointment)
}

pub async fn get_active_appointments_by_veterinarian(
    pool: &Pool<Postgres>,
    veterinarian_id: Uuid,
) -> Result<Vec<DbAppointment>> {
    let active: Vec<&str> = AppointmentStatus::ACTIVE.iter().map(|s| s.as_str()).collect();

    let appointments = sqlx::query_as::<_, DbAppointment>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM appointments
        WHERE veterinarian_id = $1 AND status = ANY($2)
        ORDER BY start_time ASC
        "#
    ))
    .bind(veterinarian_id)
    .bind(active)
    .fetch_all(pool)
    .await?;

    Ok(appointments)
}

pub async fn list_appointments(
    pool: &Pool<Postgres>,
    filter: &AppointmentFilter,
) -> Result<Vec<DbAppointment>> {
    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM appointments WHERE TRUE"));

    if let Some(veterinarian_id) = filter.veterinarian_id {
        query.push(" AND veterinarian_id = ").push_bind(veterinarian_id);
    }
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ").push_bind(owner_id);
    }
    if let Some(pet_id) = filter.pet_id {
        query.push(" AND pet_id = ").push_bind(pet_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.from {
        query.push(" AND start_time >= ").push_bind(from);
    }
    if let Some(until) = filter.until {
        query.push(" AND start_time < ").push_bind(until);
    }
    query.push(" ORDER BY start_time DESC");

    let appointments = query
        .build_query_as::<DbAppointment>()
        .fetch_all(pool)
        .await?;

    Ok(appointments)
}

pub async fn delete_appointment(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM appointments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Surfaces a double-booking refusal from the exclusion constraint as
/// [`SlotTaken`]; anything else is passed through.
fn write_error(err: sqlx::Error, draft: &AppointmentDraft) -> Report {
    if let sqlx::Error::Database(db_err) = &err {
        let excluded = db_err.code().as_deref() == Some(EXCLUSION_VIOLATION)
            || db_err.constraint() == Some(NO_DOUBLE_BOOKING);
        if excluded {
            tracing::debug!(
                "Exclusion constraint refused booking for veterinarian {}",
                draft.veterinarian_id
            );
            return Report::new(SlotTaken {
                veterinarian_id: draft.veterinarian_id,
            });
        }
    }
    Report::new(err)
}
