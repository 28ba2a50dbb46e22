//! # Vet Clinic API
//!
//! The API crate provides the web server for the clinic scheduling service.
//! It exposes RESTful endpoints for booking, editing and moving appointments
//! through their lifecycle.
//!
//! ## Architecture
//!
//! - **Routes**: Define API endpoints and URL structure
//! - **Handlers**: Turn request payloads into manager calls
//! - **Middleware**: Error to response mapping
//! - **Config**: Environment based configuration
//!
//! Every handler goes through a shared [`AppointmentManager`], which owns the
//! conflict checks and the lifecycle rules.

/// Configuration module for API settings
pub mod config;
/// Request handlers
pub mod handlers;
/// Error handling middleware
pub mod middleware;
/// Route definitions and API endpoint structure
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use vetclinic_core::AppointmentManager;

/// Shared application state that is accessible to all request handlers
pub struct ApiState {
    /// Scheduling service backing every appointment endpoint
    pub manager: Arc<AppointmentManager>,
}

impl ApiState {
    pub fn new(manager: AppointmentManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

/// Builds the router with every endpoint attached to `state`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vetclinic_api::{ApiState, app};
/// use vetclinic_core::{AppointmentManager, store::InMemoryAppointmentStore};
///
/// let manager = AppointmentManager::new(Arc::new(InMemoryAppointmentStore::new()));
/// let router = app(Arc::new(ApiState::new(manager)));
/// # let _ = router;
/// ```
pub fn app(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health check endpoints
        .merge(routes::health::routes())
        // Appointment endpoints
        .merge(routes::appointment::routes())
        .with_state(state)
}

/// Starts the API server with the provided configuration and state.
///
/// Installs the global tracing subscriber, applies CORS and the request
/// timeout, then serves until the listener fails.
pub async fn start_server(config: config::ApiConfig, state: Arc<ApiState>) -> Result<()> {
    // Initialize tracing for logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let app = app(state);

    // Apply CORS configuration if origins are specified
    let app = if let Some(origins) = &config.cors_origins {
        let origins = origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .wrap_err_with(|| format!("Invalid CORS origin: {origin}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_origin(AllowOrigin::list(origins));

        app.layer(cors)
    } else {
        app
    };

    // Add request tracing and timeout middleware
    let app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout))),
    );

    // Start the HTTP server
    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
