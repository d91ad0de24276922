//! Configuration module for the board service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;
use crate::validate::ValidationRules;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    pub store: StoreBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Deadline applied to every store operation
    pub store_timeout: Duration,
    pub rules: ValidationRules,
}

/// Read and parse a variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("BOARD_API_PSK").ok().filter(|k| !k.is_empty());

        let bind_addr = parse_var(
            "BOARD_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;

        let log_level = env::var("BOARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = parse_var("BOARD_LOG_FORMAT", LogFormat::Text)?;

        let store = parse_var("BOARD_STORE", StoreBackend::MongoDb)?;
        let mongodb_uri = env::var("BOARD_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let mongodb_database =
            env::var("BOARD_MONGODB_DATABASE").unwrap_or_else(|_| "boards".to_string());

        let timeout_secs: u64 = parse_var("BOARD_STORE_TIMEOUT_SECS", 5)?;
        if timeout_secs == 0 {
            return Err(AppError::Config(
                "Invalid BOARD_STORE_TIMEOUT_SECS: must be positive".to_string(),
            ));
        }

        let defaults = ValidationRules::default();
        let rules = ValidationRules {
            max_page_size: parse_var("BOARD_MAX_PAGE_SIZE", defaults.max_page_size)?,
            max_id_length: parse_var("BOARD_MAX_ID_LENGTH", defaults.max_id_length)?,
            max_name_length: parse_var("BOARD_MAX_NAME_LENGTH", defaults.max_name_length)?,
            max_metadata_length: parse_var(
                "BOARD_MAX_METADATA_LENGTH",
                defaults.max_metadata_length,
            )?,
            max_members: parse_var("BOARD_MAX_MEMBERS", defaults.max_members)?,
            max_filter_ids: parse_var("BOARD_MAX_FILTER_IDS", defaults.max_filter_ids)?,
        };

        Ok(Self {
            api_psk,
            bind_addr,
            log_level,
            log_format,
            store,
            mongodb_uri,
            mongodb_database,
            store_timeout: Duration::from_secs(timeout_secs),
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "BOARD_API_PSK",
        "BOARD_BIND_ADDR",
        "BOARD_LOG_LEVEL",
        "BOARD_LOG_FORMAT",
        "BOARD_STORE",
        "BOARD_MONGODB_URI",
        "BOARD_MONGODB_DATABASE",
        "BOARD_STORE_TIMEOUT_SECS",
        "BOARD_MAX_PAGE_SIZE",
        "BOARD_MAX_ID_LENGTH",
        "BOARD_MAX_NAME_LENGTH",
        "BOARD_MAX_METADATA_LENGTH",
        "BOARD_MAX_MEMBERS",
        "BOARD_MAX_FILTER_IDS",
    ];

    // Environment variables are process-wide, so every case runs in one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert!(config.api_psk.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.store, StoreBackend::MongoDb);
        assert_eq!(config.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(config.mongodb_database, "boards");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.rules, ValidationRules::default());

        env::set_var("BOARD_STORE", "memory");
        env::set_var("BOARD_MAX_PAGE_SIZE", "25");
        env::set_var("BOARD_STORE_TIMEOUT_SECS", "2");
        let config = Config::from_env().unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.rules.max_page_size, 25);
        assert_eq!(config.store_timeout, Duration::from_secs(2));

        env::set_var("BOARD_MAX_PAGE_SIZE", "lots");
        match Config::from_env() {
            Err(AppError::Config(msg)) => assert!(msg.contains("BOARD_MAX_PAGE_SIZE")),
            other => panic!("expected config error, got {:?}", other),
        }

        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("MongoDB".parse::<StoreBackend>(), Ok(StoreBackend::MongoDb));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("redis".parse::<StoreBackend>().is_err());
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
    }
}
