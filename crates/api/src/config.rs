//! # API Configuration
//!
//! Server settings are read from the process environment (a `.env` file is
//! loaded by the binaries beforehand). Everything except the database URL
//! has a default.
//!
//! | Variable                      | Default   |
//! |-------------------------------|-----------|
//! | `API_HOST`                    | `0.0.0.0` |
//! | `API_PORT`                    | `3000`    |
//! | `DATABASE_URL`                | required  |
//! | `DATABASE_MAX_CONNECTIONS`    | `5`       |
//! | `LOG_LEVEL`                   | `info`    |
//! | `API_CORS_ORIGINS`            | unset, comma separated |
//! | `API_REQUEST_TIMEOUT_SECONDS` | `30`      |
//! | `STORAGE_TIMEOUT_SECONDS`     | `5`       |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use eyre::{Result, WrapErr, eyre};
use tracing::Level;
use vetclinic_core::ManagerConfig;

/// Settings for the clinic API server.
///
/// ```no_run
/// use vetclinic_api::config::ApiConfig;
///
/// let config = ApiConfig::from_env()?;
/// println!("Binding {}", config.server_addr());
/// # Ok::<(), eyre::Report>(())
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    /// Allowed CORS origins. `None` leaves CORS headers off entirely.
    pub cors_origins: Option<Vec<String>>,
    /// Whole-request timeout, in seconds.
    pub request_timeout: u64,
    /// Bound on each storage call made by the scheduler, in seconds.
    pub storage_timeout: u64,
}

impl ApiConfig {
    /// Reads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` is missing or a numeric variable is set to
    /// something that does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with variables resolved by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| eyre!("DATABASE_URL environment variable must be set"))?;

        let cors_origins = lookup("API_CORS_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect()
        });

        Ok(Self {
            host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed_or(&lookup, "API_PORT", 3000)?,
            database_url,
            database_max_connections: parsed_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            log_level: parse_log_level(&lookup("LOG_LEVEL").unwrap_or_default()),
            cors_origins,
            request_timeout: parsed_or(&lookup, "API_REQUEST_TIMEOUT_SECONDS", 30)?,
            storage_timeout: parsed_or(&lookup, "STORAGE_TIMEOUT_SECONDS", 5)?,
        })
    }

    /// `host:port` to bind the listener to.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            storage_timeout: Duration::from_secs(self.storage_timeout),
        }
    }
}

fn parsed_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid {key} value: {raw:?}")),
        None => Ok(default),
    }
}

/// Maps a `LOG_LEVEL` value to a tracing level. Unknown values mean INFO.
pub fn parse_log_level(value: &str) -> Level {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
