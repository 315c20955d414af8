use std::sync::Arc;
use std::time::Instant;

use docflow_core::approvals::{ApproverAssignment, DocumentDraft, InMemoryNotificationSink};
use docflow_core::audit::InMemoryAuditSink;
use docflow_core::config::{AppConfig, LoadOptions};
use docflow_core::domain::document::{ActorId, DocumentStatus, TemplateId};
use docflow_core::domain::step::DecisionKind;
use docflow_core::workflow::DecisionRequest;
use docflow_db::{connect_with_settings, migrations, seed_demo_participants, DbPool};
use serde::Serialize;

use crate::commands::{approval_service, CommandResult};

const SMOKE_TEMPLATE: TemplateId = TemplateId(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_routing"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_routing"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let db_started = Instant::now();
    let db_result = runtime.block_on(async {
        connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
    });

    let pool = match db_result {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: elapsed_since(db_started),
                message: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: elapsed_since(db_started),
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("approval_routing"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let migration_started = Instant::now();
    match runtime.block_on(async { migrations::run_pending(&pool).await }) {
        Ok(()) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Pass,
            elapsed_ms: elapsed_since(migration_started),
            message: "migrations are visible and executable".to_string(),
        }),
        Err(error) => {
            checks.push(SmokeCheck {
                name: "migration_visibility",
                status: SmokeStatus::Fail,
                elapsed_ms: elapsed_since(migration_started),
                message: format!("migration execution failed: {error}"),
            });
            checks.push(skipped("approval_routing"));
            runtime.block_on(async { pool.close().await });
            return finalize_report(checks, elapsed_since(started));
        }
    }

    let routing_started = Instant::now();
    let routing_result = runtime.block_on(route_sample_document(&config, pool.clone()));
    runtime.block_on(async { pool.close().await });

    checks.push(match routing_result {
        Ok(message) => SmokeCheck {
            name: "approval_routing",
            status: SmokeStatus::Pass,
            elapsed_ms: elapsed_since(routing_started),
            message,
        },
        Err(message) => SmokeCheck {
            name: "approval_routing",
            status: SmokeStatus::Fail,
            elapsed_ms: elapsed_since(routing_started),
            message,
        },
    });

    finalize_report(checks, elapsed_since(started))
}

/// Routes one document through every step role against the configured
/// database. The sample document is left in place as a completed record.
async fn route_sample_document(config: &AppConfig, pool: DbPool) -> Result<String, String> {
    seed_demo_participants(&pool).await.map_err(|error| format!("seeding failed: {error}"))?;

    let notifications = InMemoryNotificationSink::default();
    let audit = InMemoryAuditSink::default();
    let service =
        approval_service(config, pool, Arc::new(notifications.clone()), Arc::new(audit.clone()));

    let document_id = service
        .create_document(DocumentDraft {
            template_id: SMOKE_TEMPLATE,
            title: "docflow smoke check".to_string(),
            content: "automated readiness probe".to_string(),
            author_id: ActorId(100),
            assignments: vec![
                ApproverAssignment::mandatory(ActorId(1)),
                ApproverAssignment::consent(ActorId(2)),
                ApproverAssignment::mandatory(ActorId(3)),
                ApproverAssignment::reference(ActorId(4)),
            ],
        })
        .await
        .map_err(|error| format!("create failed: {error}"))?;
    service
        .submit_for_approval(document_id)
        .await
        .map_err(|error| format!("submit failed: {error}"))?;

    let decisions = [
        (ActorId(1), DecisionKind::Approve),
        (ActorId(2), DecisionKind::Approve),
        (ActorId(4), DecisionKind::Acknowledge),
        (ActorId(3), DecisionKind::Approve),
    ];
    for (actor_id, decision) in decisions {
        service
            .decide(DecisionRequest { document_id, actor_id, decision, comment: None })
            .await
            .map_err(|error| format!("{actor_id} could not {}: {error}", decision.as_str()))?;
    }

    let document = service
        .get_document(document_id)
        .await
        .map_err(|error| format!("reload failed: {error}"))?;
    if document.status != DocumentStatus::Completed {
        return Err(format!(
            "{document_id} ended as `{}` instead of `completed`",
            document.status.as_str()
        ));
    }

    Ok(format!(
        "{document_id} completed after {} decisions; {} notifications, {} audit events",
        decisions.len(),
        notifications.notifications().len(),
        audit.events().len()
    ))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
