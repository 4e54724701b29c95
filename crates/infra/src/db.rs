//! Postgres connection pool wiring.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{StoreError, map_sqlx_error};
use crate::store::PgStorage;

/// Connect to Postgres, apply migrations and return the storage engine.
pub async fn connect(database_url: &str, config: &AppConfig) -> Result<PgStorage, StoreError> {
    info!(
        url = %mask_password(database_url),
        min_connections = config.db_pool_size,
        max_connections = config.max_connections(),
        "connecting to postgres"
    );

    let pool: PgPool = PgPoolOptions::new()
        .min_connections(config.db_pool_size)
        .max_connections(config.max_connections())
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    let storage = PgStorage::new(pool);
    storage.migrate().await?;
    info!("postgres ready");
    Ok(storage)
}

/// Mask the password portion of a database URL for safe logging.
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
