use std::sync::Arc;

use docflow_core::approvals::{
    DomainHookRegistry, LoggingNotificationSink, NotificationSink, SideEffectDispatcher,
    StaticHookRegistry,
};
use docflow_core::audit::{AuditSink, TracingAuditSink};
use docflow_core::config::{AppConfig, ConfigError, LoadOptions};
use docflow_core::workflow::ApprovalService;
use docflow_db::{
    connect_with_settings, migrations, DbPool, SqlDocumentRepository, SqlParticipantRegistry,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub approvals: Arc<ApprovalService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Collaborators supplied by the embedding application. Defaults log
/// notifications and register no domain hooks.
pub struct Integrations {
    pub notifications: Arc<dyn NotificationSink>,
    pub hooks: Arc<dyn DomainHookRegistry>,
    pub audit: Arc<dyn AuditSink>,
}

impl Default for Integrations {
    fn default() -> Self {
        Self {
            notifications: Arc::new(LoggingNotificationSink),
            hooks: Arc::new(StaticHookRegistry::default()),
            audit: Arc::new(TracingAuditSink),
        }
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, Integrations::default()).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    integrations: Integrations,
) -> Result<Application, BootstrapError> {
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

    let approvals = Arc::new(approval_service(&config, db_pool.clone(), integrations));
    info!(
        event_name = "system.bootstrap.workflow_ready",
        correlation_id = "bootstrap",
        max_steps = config.workflow.max_steps,
        notify_participants = config.workflow.notify_participants,
        "approval workflow service wired"
    );

    Ok(Application { config, db_pool, approvals })
}

pub fn approval_service(
    config: &AppConfig,
    db_pool: DbPool,
    integrations: Integrations,
) -> ApprovalService {
    let dispatcher = SideEffectDispatcher::new(integrations.notifications, integrations.hooks)
        .notify_participants(config.workflow.notify_participants);

    ApprovalService::new(
        Arc::new(SqlDocumentRepository::new(db_pool.clone())),
        Arc::new(SqlParticipantRegistry::new(db_pool)),
        dispatcher,
        integrations.audit,
    )
    .with_max_steps(config.workflow.max_steps)
}
