use sea_orm::{ConnectOptions, ConnectionTrait, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::CONFIG;
use crate::error::{AppError, Result};
use crate::migrations::Migrator;
use crate::state::DbConn;

/// Connect using the configured URL and bring the schema up to date
pub async fn connect() -> Result<DbConn> {
    connect_with_url(&CONFIG.database.database_url).await
}

/// Pool settings for a URL. An in-memory SQLite database exists once per
/// connection, so it gets exactly one.
fn pool_options(database_url: &str) -> ConnectOptions {
    let mut opts = ConnectOptions::new(database_url);
    let in_memory = database_url.contains(":memory:");
    opts.max_connections(if in_memory { 1 } else { CONFIG.database.max_connections })
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .sqlx_logging(false);
    if !in_memory {
        opts.idle_timeout(Duration::from_secs(600));
    }
    opts
}

/// Connect to `database_url` and run pending migrations
pub async fn connect_with_url(database_url: &str) -> Result<DbConn> {
    let db = Database::connect(pool_options(database_url))
        .await
        .map_err(|e| AppError::Internal(format!("Failed to connect to database: {}", e)))?;
    tracing::info!(backend = ?db.get_database_backend(), "Database connected");

    Migrator::up(&db, None)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;
    tracing::debug!("Migrations applied");

    Ok(db)
}
