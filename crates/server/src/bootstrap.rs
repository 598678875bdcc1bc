use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use botdesk_core::audit::{AuditSink, TracingAuditSink};
use botdesk_core::catalog::Catalog;
use botdesk_core::config::AppConfig;
use botdesk_core::flows::{InMemorySessionStore, SessionMachine};
use botdesk_db::{connect_from_config, migrations, DbPool, RequestRepository, SqlRequestRepository};
use botdesk_telegram::{
    ActionDispatcher, ConversationService, PollingRunner, ReconnectPolicy, TelegramClient,
    TelegramUpdateSource,
};
use thiserror::Error;
use tracing::info;

use crate::dashboard::{self, AdminCredentials, DashboardState};
use crate::health;
use crate::mailer::notifier_from_config;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub requests: Arc<dyn RequestRepository>,
    pub telegram: Arc<TelegramClient>,
    pub runner: PollingRunner,
}

impl Application {
    /// Dashboard and health routes on one listener.
    pub fn http_router(&self) -> Router {
        let dashboard = DashboardState::new(
            Arc::clone(&self.requests),
            self.telegram.clone(),
            AdminCredentials::from_config(&self.config.admin),
        );
        dashboard::router(dashboard).merge(health::router(self.db_pool.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let requests: Arc<dyn RequestRepository> = Arc::new(SqlRequestRepository::new(db_pool.clone()));
    let telegram = Arc::new(TelegramClient::from_config(&config.telegram));
    let (notifier, operator_address) = notifier_from_config(&config.notifier);
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    let machine =
        SessionMachine::new(Arc::new(Catalog::default()), Arc::new(InMemorySessionStore::default()));
    let dispatcher = ActionDispatcher::new(
        telegram.clone(),
        Arc::clone(&requests),
        notifier,
        Arc::clone(&audit),
        operator_address,
    );
    let service = Arc::new(ConversationService::new(machine, dispatcher, telegram.clone(), audit));

    let source = Arc::new(TelegramUpdateSource::new(
        (*telegram).clone(),
        Duration::from_secs(config.telegram.poll_timeout_secs),
    ));
    let runner = PollingRunner::new(source, service, ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.wired",
        correlation_id = "bootstrap",
        notifier = if config.notifier.enabled { "http_relay" } else { "log" },
        "collaborators wired"
    );

    Ok(Application { config, db_pool, requests, telegram, runner })
}
