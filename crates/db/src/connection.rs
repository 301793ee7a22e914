use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use payflow_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Open a pool sized from config. Foreign keys are enforced per
/// connection; WAL with a busy timeout keeps concurrent deciders from
/// tripping SQLITE_BUSY around the version-guarded step updates.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.timeout_secs.clamp(1, 300)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

/// Single-connection in-memory pool for tests and demos.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    };
    connect(&config).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::connect_in_memory;

    #[tokio::test]
    async fn in_memory_pool_enforces_foreign_keys() {
        let pool = connect_in_memory().await.expect("connect");
        let row = sqlx::query("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        let enabled: i64 = row.try_get(0).expect("value");
        assert_eq!(enabled, 1);
    }
}
