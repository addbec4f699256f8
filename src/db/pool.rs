//! Database connection pool management

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;

/// Reported in `pg_stat_activity`
const APPLICATION_NAME: &str = "iptv-ingest";

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
}

fn connect_options(config: &Config) -> Result<PgConnectOptions, sqlx::Error> {
    let options: PgConnectOptions = config.database_url.parse()?;
    Ok(options.application_name(APPLICATION_NAME))
}

/// Create a PostgreSQL connection pool
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let options = connect_options(config)?;
    info!(
        "host" = options.get_host(),
        "database" = options.get_database(),
        "Connecting to PostgreSQL"
    );

    let pool = pool_options(config).connect_with(options).await?;

    info!(
        "max_connections" = config.db_max_connections,
        "acquire_timeout_secs" = config.db_acquire_timeout_secs,
        "PostgreSQL pool ready"
    );

    Ok(pool)
}

/// Apply the playlist schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("Database migrations completed");

    Ok(())
}

/// Round-trip a trivial query; logs and returns false on failure
pub async fn health_check(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    }
}
