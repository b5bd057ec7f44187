use std::time::Duration;

use thiserror::Error;
use tracing::info;

use tripflow_core::config::{AppConfig, ConfigError, LoadOptions};
use tripflow_core::notifications::NotificationError;
use tripflow_db::{connect_with_config, migrations, DbPool};

use crate::notify::build_notifier;
use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification client could not be built: {0}")]
    Notifier(#[source] NotificationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = build_notifier(&config.notifications).map_err(BootstrapError::Notifier)?;
    info!(
        event_name = "system.bootstrap.notifier_ready",
        correlation_id = "bootstrap",
        delivery = if config.notifications.enabled { "webhook" } else { "log" },
        "notification client initialized"
    );

    let state = AppState::new(
        db_pool.clone(),
        notifier,
        config.uploads.clone(),
        Duration::from_secs(config.submissions.dedup_window_secs),
    );

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use tripflow_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist/tripflow.toml".into()),
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_state() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('service_request', 'approval_step', 'app_user', 'visa_document')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 4);

        let users = app.state.users.list().await.expect("user list");
        assert!(users.is_empty());
        assert_eq!(app.state.submissions.window().as_secs(), app.config.submissions.dedup_window_secs);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_notifications_lack_a_url() {
        let mut options = overrides("sqlite::memory:");
        options.overrides.notifications_enabled = Some(true);

        let result = bootstrap(options).await;

        let Err(BootstrapError::Config(error)) = result else {
            panic!("expected a configuration error");
        };
        assert!(error.to_string().contains("notifications.webhook_url"));
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_urls() {
        let result = bootstrap(overrides("postgres://localhost/tripflow")).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
