use std::sync::Arc;

use carty_agent::llm::HttpLlmClient;
use carty_agent::runtime::AgentRuntime;
use carty_catalog::client::{CatalogError, StoreClient};
use carty_core::config::{AppConfig, ConfigError, LoadOptions};
use carty_db::repositories::{
    MessageRepository, SqlCartRepository, SqlMessageRepository, SqlProductCacheRepository,
};
use carty_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: Arc<AgentRuntime>,
    pub message_repo: Arc<dyn MessageRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog client construction failed: {0}")]
    Catalog(#[source] CatalogError),
    #[error("llm client construction failed: {0}")]
    Llm(String),
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

    let catalog = StoreClient::new(&config.catalog.base_url, config.catalog.timeout_secs)
        .map_err(BootstrapError::Catalog)?;
    let llm = HttpLlmClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::Llm(error.to_string()))?;

    let agent_runtime = Arc::new(AgentRuntime::new(
        Arc::new(llm),
        Arc::new(catalog),
        Arc::new(SqlCartRepository::new(db_pool.clone())),
        Arc::new(SqlProductCacheRepository::new(db_pool.clone())),
    ));
    let message_repo: Arc<dyn MessageRepository> =
        Arc::new(SqlMessageRepository::new(db_pool.clone()));

    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        catalog_base_url = %config.catalog.base_url,
        "agent runtime constructed"
    );

    Ok(Application { config, db_pool, agent_runtime, message_repo })
}
