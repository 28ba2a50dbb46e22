use eyre::Result;
use sqlx::{Executor, Pool, Postgres};
use tracing::info;

/// Name of the exclusion constraint that refuses overlapping active
/// appointments for one veterinarian.
pub const NO_DOUBLE_BOOKING: &str = "appointments_no_double_booking";

pub async fn initialize_database(pool: &Pool<Postgres>) -> Result<()> {
    info!("Initializing database schema...");

    // Needed for the uuid equality operator inside the gist exclusion constraint
    sqlx::query("CREATE EXTENSION IF NOT EXISTS btree_gist;")
        .execute(pool)
        .await?;

    // Create appointments table
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            start_time TIMESTAMP WITH TIME ZONE NOT NULL,
            end_time TIMESTAMP WITH TIME ZONE NOT NULL,
            duration_minutes INTEGER NOT NULL,
            veterinarian_id UUID NOT NULL,
            pet_id UUID NOT NULL,
            owner_id UUID NOT NULL,
            kind VARCHAR(32) NOT NULL DEFAULT 'general_consultation',
            status VARCHAR(32) NOT NULL DEFAULT 'scheduled',
            reason TEXT NOT NULL,
            notes TEXT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NULL,
            CONSTRAINT positive_duration CHECK (duration_minutes > 0),
            CONSTRAINT consistent_end_time CHECK (end_time = start_time + duration_minutes * INTERVAL '1 minute'),
            CONSTRAINT reason_present CHECK (length(trim(reason)) > 0),
            CONSTRAINT valid_kind CHECK (kind IN (
                'general_consultation', 'vaccination', 'sterilization',
                'emergency', 'checkup', 'surgery'
            )),
            CONSTRAINT valid_status CHECK (status IN (
                'scheduled', 'confirmed', 'in_progress',
                'completed', 'cancelled', 'no_show'
            )),
            CONSTRAINT {NO_DOUBLE_BOOKING} EXCLUDE USING gist (
                veterinarian_id WITH =,
                tstzrange(start_time, end_time, '[)') WITH &&
            ) WHERE (status IN ('scheduled', 'confirmed', 'in_progress'))
        );
        "#
    ))
    .execute(pool)
    .await?;

    // Create indexes (several statements, so sent as a simple query)
    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_appointments_veterinarian_id ON appointments(veterinarian_id);
        CREATE INDEX IF NOT EXISTS idx_appointments_owner_id ON appointments(owner_id);
        CREATE INDEX IF NOT EXISTS idx_appointments_pet_id ON appointments(pet_id);
        CREATE INDEX IF NOT EXISTS idx_appointments_start_time ON appointments(start_time);
        CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);
        "#,
    )
    .await?;

    info!("Database schema initialized successfully.");
    Ok(())
}
