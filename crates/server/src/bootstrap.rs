use std::sync::Arc;

use reviewbot_api::{ApiError, HttpReviewApi};
use reviewbot_core::config::{AppConfig, ConfigError, LoadOptions};
use reviewbot_core::BusinessUnitId;
use reviewbot_db::{connect_with_settings, migrations, DbPool, FeedSettingsStore, SqlTeamRepository};
use reviewbot_slack::{
    SlackApiError, SlackServices, SlackWebClient, TracingDeliveryObserver, WorkspaceRegistry,
};
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub registry: Arc<WorkspaceRegistry>,
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
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("review platform client setup failed: {0}")]
    ReviewApi(#[source] ApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let store = FeedSettingsStore::new(Arc::new(SqlTeamRepository::new(db_pool.clone())));
    let transport =
        Arc::new(SlackWebClient::new(&config.slack).map_err(BootstrapError::SlackClient)?);
    let registry = Arc::new(WorkspaceRegistry::new(transport, config.slack.bot_name.clone()));
    let api = Arc::new(HttpReviewApi::new(&config.review_api).map_err(BootstrapError::ReviewApi)?);
    let default_business_unit =
        config.review_api.default_business_unit_id.clone().map(BusinessUnitId);

    let services = SlackServices::new(
        store,
        Arc::clone(&registry),
        api,
        Arc::new(TracingDeliveryObserver),
        default_business_unit.clone(),
    );
    let state = AppState::new(services, config.slack.signing_secret.clone(), default_business_unit);

    Ok(Application { config, db_pool, registry, state })
}

#[cfg(test)]
mod tests {
    use reviewbot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str, signing_secret: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_signing_secret: signing_secret.map(str::to_string),
                review_api_key: Some("key".to_string()),
                review_api_secret: Some("secret".to_string()),
                business_user_name: Some("owner@example.test".to_string()),
                business_user_password: Some("hunter2".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_signing_secret() {
        let result = bootstrap(overrides("sqlite::memory:", Some(" "))).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.signing_secret"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_services() {
        let path = std::env::temp_dir().join(format!("reviewbot-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let app = bootstrap(overrides(&url, Some("signing")))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'team'")
                .fetch_one(&app.db_pool)
                .await
                .expect("schema query");
        assert_eq!(count, 1);
        assert_eq!(app.state.dispatcher.handler_count(), 3);
        assert!(app.registry.is_empty().await);

        app.db_pool.close().await;
        let _ = std::fs::remove_file(path);
    }
}
