//! User service configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use common::{DatabaseConfig, ServiceConfig};

/// Default HTTP port for the user service
pub const DEFAULT_PORT: u16 = 8000;

/// Default directory for rolling log files
pub const DEFAULT_LOG_DIR: &str = "logs";

/// User service configuration.
#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    /// Server settings
    pub service: ServiceConfig,
    /// Database and pool settings
    pub database: DatabaseConfig,
    /// Verbose, human-oriented logging
    pub debug: bool,
    /// Where rolling log files are written
    pub log_dir: PathBuf,
}

impl UserServiceConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_defaults = DatabaseConfig::default();

        let database = DatabaseConfig {
            url: lookup("USER_SERVICE_DATABASE_URL")
                .or_else(|| lookup("DATABASE_URL"))
                .or_else(|| database_url_from_parts(&lookup))
                .unwrap_or(db_defaults.url),
            pool_size: parse_var(&lookup, "DB_POOL_SIZE").unwrap_or(db_defaults.pool_size),
            max_overflow: parse_var(&lookup, "DB_MAX_OVERFLOW").unwrap_or(db_defaults.max_overflow),
            min_connections: parse_var(&lookup, "DB_MIN_CONNECTIONS").unwrap_or(db_defaults.min_connections),
            pool_timeout_secs: parse_var(&lookup, "DB_POOL_TIMEOUT").unwrap_or(db_defaults.pool_timeout_secs),
            pool_recycle_secs: parse_var(&lookup, "DB_POOL_RECYCLE").unwrap_or(db_defaults.pool_recycle_secs),
            session_mode: lookup("DB_SESSION_MODE").unwrap_or(db_defaults.session_mode),
        };

        let debug = lookup("DEBUG")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let service = ServiceConfig {
            service_name: "user-service".to_string(),
            host: lookup("USER_SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&lookup, "USER_SERVICE_PORT").unwrap_or(DEFAULT_PORT),
            log_level: if debug { "debug" } else { "info" }.to_string(),
        };

        let log_dir = lookup("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        Self {
            service,
            database,
            debug,
            log_dir,
        }
    }
}

/// Look up `key` and parse it, ignoring unparsable values.
fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok())
}

/// Assemble a Postgres URL from the discrete `POSTGRESQL_*` variables.
///
/// Returns `None` unless every part is present.
fn database_url_from_parts<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let user = lookup("POSTGRESQL_USER")?;
    let password = lookup("POSTGRESQL_PASSWORD")?;
    let host = lookup("POSTGRESQL_HOST")?;
    let port = lookup("POSTGRESQL_PORT")?;
    let database = lookup("POSTGRESQL_DATABASE")?;

    Some(format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    ))
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "user-service".to_string(),
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                log_level: "info".to_string(),
            },
            database: DatabaseConfig::default(),
            debug: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}
