use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::AppError;

const SECRETS_DIR: &str = "/run/secrets";

pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub session_ttl_hours: i64,
    pub cors_origin: String,
    /// Argon2 memory cost in KiB.
    pub password_memory_kib: u32,
    /// Bearer key granting the privileged service role. `None` disables it.
    pub service_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            database_path: try_load("DATABASE_PATH", "schoolboard.db")?,
            session_ttl_hours: try_load("SESSION_TTL_HOURS", "168")?,
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:5173")?,
            password_memory_kib: try_load("PASSWORD_MEMORY_KIB", "19456")?,
            service_key: read_secret("SCHOOLBOARD_SERVICE_KEY"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            database_path: PathBuf::from("schoolboard.db"),
            session_ttl_hours: 168,
            cors_origin: "http://localhost:5173".to_string(),
            password_memory_kib: 19456,
            service_key: None,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::Config(format!("invalid {key}: {e}"))
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}, service access disabled");
        })
        .ok()
        .filter(|key| !key.is_empty())
}
