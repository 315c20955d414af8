pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;
pub mod workflow;

use std::sync::Arc;

use docflow_core::approvals::{NotificationSink, SideEffectDispatcher, StaticHookRegistry};
use docflow_core::audit::AuditSink;
use docflow_core::config::{AppConfig, LoadOptions};
use docflow_core::workflow::ApprovalService;
use docflow_db::{
    connect_with_settings, migrations, DbPool, SqlDocumentRepository, SqlParticipantRegistry,
};
use serde::Serialize;
use serde_json::Value;

/// `(error_class, message, exit_code)` carried out of a command's async block.
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::ok(command, message.into(), Some(data))
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) async fn open_migrated_pool(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

/// Wires the approval service over SQLite with no domain hooks registered.
pub fn approval_service(
    config: &AppConfig,
    pool: DbPool,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
) -> ApprovalService {
    let dispatcher =
        SideEffectDispatcher::new(notifications, Arc::new(StaticHookRegistry::default()))
            .notify_participants(config.workflow.notify_participants);

    ApprovalService::new(
        Arc::new(SqlDocumentRepository::new(pool.clone())),
        Arc::new(SqlParticipantRegistry::new(pool)),
        dispatcher,
        audit,
    )
    .with_max_steps(config.workflow.max_steps)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::CommandResult;

    #[test]
    fn failure_payload_carries_error_class() {
        let result = CommandResult::failure("show", "not_found", "document 9 not found", 7);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 7);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "not_found");
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn data_is_attached_only_when_present() {
        let result = CommandResult::success_with_data("inbox", "1 step", json!([{"step_order": 2}]));
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(payload["data"][0]["step_order"], 2);
        assert!(payload["error_class"].is_null());
    }
}
