use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite by default; any `postgres://` URL switches backend
    pub database_url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("COURPERA_DATABASE_URL")
                .or_else(|_| env::var("DATABASE_URL"))
                .unwrap_or_else(|_| "sqlite://courpera.db?mode=rwc".to_string()),
            max_connections: env::var("COURPERA_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
        }
    }
}
