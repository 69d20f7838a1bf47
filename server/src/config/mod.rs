use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::scheduler::DailySchedule;
use crate::services::reconcile::DEFAULT_BATCH_SIZE;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::apply_security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/agora_checkin";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_RECONCILE_AT: &str = "00:00";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub server_addr: SocketAddr,
    /// UTC time of day at which the reconciliation sweep runs.
    pub reconcile_schedule: DailySchedule,
    pub reconcile_batch_size: usize,
    pub cors_allowed_origins: Vec<String>,
    /// Enables HSTS.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let max_connections = parse_var(
            "DATABASE_MAX_CONNECTIONS",
            var("DATABASE_MAX_CONNECTIONS", &DEFAULT_MAX_CONNECTIONS.to_string()),
        )?;

        let server_addr = parse_var("SERVER_ADDR", var("SERVER_ADDR", DEFAULT_SERVER_ADDR))?;

        let reconcile_at = var("RECONCILE_AT", DEFAULT_RECONCILE_AT);
        let reconcile_schedule =
            DailySchedule::parse(&reconcile_at).map_err(|e| ConfigError::Invalid {
                name: "RECONCILE_AT",
                value: reconcile_at.clone(),
                reason: e.to_string(),
            })?;

        let reconcile_batch_size: usize = parse_var(
            "RECONCILE_BATCH_SIZE",
            var("RECONCILE_BATCH_SIZE", &DEFAULT_BATCH_SIZE.to_string()),
        )?;
        if reconcile_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "RECONCILE_BATCH_SIZE",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let production = lookup("RUST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            database_url: var("DATABASE_URL", DEFAULT_DATABASE_URL),
            max_connections,
            server_addr,
            reconcile_schedule,
            reconcile_batch_size,
            cors_allowed_origins,
            production,
        })
    }
}

fn parse_var<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.server_addr.port(), 3001);
        assert_eq!(config.reconcile_schedule.at(), NaiveTime::MIN);
        assert_eq!(config.reconcile_batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert!(!config.production);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RECONCILE_AT", "04:15"),
            ("RECONCILE_BATCH_SIZE", "25"),
            ("CORS_ALLOWED_ORIGINS", "https://tickets.example.com, ,"),
            ("RUST_ENV", "Production"),
        ])
        .unwrap();
        assert_eq!(
            config.reconcile_schedule.at(),
            NaiveTime::from_hms_opt(4, 15, 0).unwrap()
        );
        assert_eq!(config.reconcile_batch_size, 25);
        assert_eq!(config.cors_allowed_origins, vec!["https://tickets.example.com"]);
        assert!(config.production);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config_from(&[("RECONCILE_AT", "noon")]).unwrap_err();
        assert!(err.to_string().contains("RECONCILE_AT"));

        let err = config_from(&[("RECONCILE_BATCH_SIZE", "0")]).unwrap_err();
        assert!(err.to_string().contains("RECONCILE_BATCH_SIZE"));

        let err = config_from(&[("SERVER_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_ADDR"));
    }
}
