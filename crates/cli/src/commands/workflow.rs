use std::sync::Arc;

use docflow_core::approvals::LoggingNotificationSink;
use docflow_core::audit::TracingAuditSink;
use docflow_core::config::AppConfig;
use docflow_core::domain::document::{ActorId, DocumentId};
use docflow_core::errors::{ApplicationError, ErrorClass};
use docflow_core::workflow::ApprovalService;
use serde_json::{json, Value};

use crate::commands::{
    approval_service, load_config, open_migrated_pool, runtime, CommandResult, Failure,
};

pub fn inbox(actor_id: i64) -> CommandResult {
    let actor_id = ActorId(actor_id);
    execute("inbox", |service| async move {
        let steps = service.list_actionable_for(actor_id).await.map_err(workflow_failure)?;
        let message = format!("{actor_id} has {} actionable step(s)", steps.len());
        Ok((message, json!(steps)))
    })
}

pub fn show(document_id: i64) -> CommandResult {
    let document_id = DocumentId(document_id);
    execute("show", |service| async move {
        let document = service.get_document(document_id).await.map_err(workflow_failure)?;
        let message = format!(
            "{document_id} `{}` is {} with {} step(s)",
            document.title,
            document.status.as_str(),
            document.line.len()
        );
        Ok((message, json!(document)))
    })
}

fn execute<F, Fut>(command: &str, query: F) -> CommandResult
where
    F: FnOnce(Arc<ApprovalService>) -> Fut,
    Fut: std::future::Future<Output = Result<(String, Value), Failure>>,
{
    let config = match load_config(command) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let outcome = query(Arc::new(read_only_service(&config, pool.clone()))).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok((message, data)) => CommandResult::success_with_data(command, message, data),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

fn read_only_service(config: &AppConfig, pool: docflow_db::DbPool) -> ApprovalService {
    approval_service(config, pool, Arc::new(LoggingNotificationSink), Arc::new(TracingAuditSink))
}

fn workflow_failure(error: ApplicationError) -> Failure {
    let error_class = match error.class() {
        ErrorClass::Validation => "validation",
        ErrorClass::Conflict => "conflict",
        ErrorClass::NotFound => "not_found",
        ErrorClass::Unavailable => "unavailable",
        ErrorClass::Fatal => "fatal",
    };
    (error_class, error.to_string(), 7)
}
