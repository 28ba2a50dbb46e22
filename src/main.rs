use std::sync::Arc;

use color_eyre::eyre::Result;
use dotenv::dotenv;
use vetclinic_api::{ApiState, config::ApiConfig};
use vetclinic_core::AppointmentManager;
use vetclinic_db::{PgAppointmentStore, create_pool, schema::initialize_database};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = ApiConfig::from_env()?;

    // Create database connection pool
    let db_pool = create_pool(&config.database_url, config.database_max_connections).await?;

    // Initialize database schema
    initialize_database(&db_pool).await?;

    // Wire the scheduling service to Postgres
    let manager_config = config.manager_config();
    let store = Arc::new(PgAppointmentStore::new(db_pool).with_write_timeout(manager_config.storage_timeout));
    let manager = AppointmentManager::with_config(store, manager_config);
    let state = Arc::new(ApiState::new(manager));

    // Start API server
    vetclinic_api::start_server(config, state).await?;

    Ok(())
}
