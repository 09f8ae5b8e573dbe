use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub const MAX_CONNECTIONS: u32 = 10;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::debug!("Opening role store pool (max {} connections)", MAX_CONNECTIONS);
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await
}
