use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

fn pool_options() -> PgPoolOptions {
    let max_connections = std::env::var("SITEFLOW_DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(4)
        .clamp(1, 32);

    let acquire_timeout_secs = std::env::var("SITEFLOW_DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10)
        .clamp(1, 60);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
}

pub async fn make_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = pool_options().connect(database_url).await?;
    Ok(pool)
}

/// Pool that opens its first connection on first use.
pub fn make_lazy_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = pool_options().connect_lazy(database_url)?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
