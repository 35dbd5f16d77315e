pub mod auth;
pub mod database;
pub mod server;
pub mod throttle;
pub mod uploads;

use once_cell::sync::Lazy;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server: server::ServerConfig,
    pub database: database::DatabaseConfig,
    pub auth: auth::AuthConfig,
    pub uploads: uploads::UploadsConfig,
    pub throttle: throttle::ThrottleConfig,

    pub version: String,

    // Logging
    pub log_level: String,
    /// `json` for structured output, anything else for human-readable lines
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: server::ServerConfig::from_env(),
            database: database::DatabaseConfig::from_env(),
            auth: auth::AuthConfig::from_env(),
            uploads: uploads::UploadsConfig::from_env(),
            throttle: throttle::ThrottleConfig::from_env(),

            version: env!("CARGO_PKG_VERSION").to_string(),

            log_level: env::var("COURPERA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("COURPERA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
