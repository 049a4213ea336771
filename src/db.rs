use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{
    Executor, MySqlPool,
    mysql::MySqlPoolOptions,
};
use tracing::info;

use crate::config::Config;

/// Opens the pool and applies pending migrations.
///
/// Every connection runs SERIALIZABLE with a bounded lock wait.
pub async fn init_db(database_url: &str, config: &Config) -> Result<MySqlPool> {
    let lock_wait = config.db_lock_wait_timeout_secs;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                (&mut *conn)
                    .execute("SET SESSION TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                    .await?;
                (&mut *conn)
                    .execute(format!("SET SESSION innodb_lock_wait_timeout = {lock_wait}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    info!(max_connections = config.db_max_connections, "Database ready");
    Ok(pool)
}
