use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tripflow_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let database_url = normalize_url(database_url);
    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    // Every in-memory connection is its own database.
    if is_memory_url(&database_url) {
        options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
    }
    options
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await
}

/// Round-trip probe used by health checks and `doctor`.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await.map(|_| ())
}

fn normalize_url(database_url: &str) -> String {
    if database_url.trim() == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        database_url.trim().to_string()
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_memory_url, normalize_url, ping};

    #[test]
    fn bare_memory_url_is_expanded() {
        assert_eq!(normalize_url(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_url(" sqlite://tripflow.db "), "sqlite://tripflow.db");
        assert!(is_memory_url("sqlite::memory:"));
        assert!(!is_memory_url("sqlite://tripflow.db?mode=rwc"));
    }

    #[tokio::test]
    async fn in_memory_pool_answers_ping() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        ping(&pool).await.expect("ping");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_database() {
        let pool = connect_with_settings("sqlite::memory:", 4, 30).await.expect("connect");
        sqlx::query("CREATE TABLE probe (id INTEGER)").execute(&pool).await.expect("create");

        let (first, second) = tokio::join!(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM probe").fetch_one(&pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM probe").fetch_one(&pool),
        );
        assert_eq!(first.expect("first"), 0);
        assert_eq!(second.expect("second"), 0);
    }
}
