use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use docflow_core::approvals::{
    ApprovalRouter, ApproverAssignment, DocumentDraft, InMemoryNotificationSink,
    SideEffectDispatcher, StaticHookRegistry,
};
use docflow_core::audit::InMemoryAuditSink;
use docflow_core::domain::document::{
    ActorId, Document, DocumentId, DocumentStatus, NewDocument, TemplateId,
};
use docflow_core::domain::line::ApprovalLine;
use docflow_core::domain::step::{ApprovalStep, DecisionKind, StepDecision, StepRole};
use docflow_core::errors::{ApplicationError, DomainError};
use docflow_core::workflow::{ApprovalService, DecisionRequest, DocumentRepository, StoreError};
use docflow_db::{
    connect_with_settings, migrations, seed_demo_participants, DbPool, SqlDocumentRepository,
    SqlParticipantRegistry,
};

async fn open(path: &Path) -> DbPool {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = connect_with_settings(&url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

fn service(pool: &DbPool) -> ApprovalService {
    let dispatcher = SideEffectDispatcher::new(
        Arc::new(InMemoryNotificationSink::default()),
        Arc::new(StaticHookRegistry::default()),
    );
    ApprovalService::new(
        Arc::new(SqlDocumentRepository::new(pool.clone())),
        Arc::new(SqlParticipantRegistry::new(pool.clone())),
        dispatcher,
        Arc::new(InMemoryAuditSink::default()),
    )
}

fn expense_report() -> DocumentDraft {
    DocumentDraft {
        template_id: TemplateId(3),
        title: "Expense report".to_string(),
        content: "<p>conference travel</p>".to_string(),
        author_id: ActorId(100),
        assignments: vec![
            ApproverAssignment::mandatory(ActorId(1)),
            ApproverAssignment::consent(ActorId(2)),
            ApproverAssignment::mandatory(ActorId(3)),
        ],
    }
}

fn request(
    document_id: DocumentId,
    actor: i64,
    decision: DecisionKind,
    comment: Option<&str>,
) -> DecisionRequest {
    DecisionRequest {
        document_id,
        actor_id: ActorId(actor),
        decision,
        comment: comment.map(str::to_string),
    }
}

#[tokio::test]
async fn routing_state_survives_reconnecting() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("docflow.db");

    let first = open(&path).await;
    seed_demo_participants(&first).await.expect("seed");
    let document_id = {
        let service = service(&first);
        let id = service.create_document(expense_report()).await.expect("create");
        service.submit_for_approval(id).await.expect("submit");
        service
            .decide(request(id, 1, DecisionKind::Approve, None))
            .await
            .expect("first approval");
        id
    };
    first.close().await;

    let second = open(&path).await;
    let service = service(&second);

    let line = service.get_approval_line(document_id).await.expect("line");
    assert_eq!(line[0].decision, StepDecision::Approved);
    assert!(line[0].decided_at.is_some());
    assert!(line[1..].iter().all(|step| step.decision == StepDecision::Pending));

    service.decide(request(document_id, 2, DecisionKind::Approve, None)).await.expect("consent");
    let outcome = service
        .decide(request(document_id, 3, DecisionKind::Approve, Some("approved, file receipts")))
        .await
        .expect("final approval");
    assert_eq!(outcome.document_status, DocumentStatus::Completed);

    let stored = service.get_document(document_id).await.expect("document");
    assert_eq!(stored.status, DocumentStatus::Completed);
    assert_eq!(stored.line.steps()[2].comment.as_deref(), Some("approved, file receipts"));
    assert!(stored.settled_at.is_some());

    second.close().await;
}

#[tokio::test]
async fn a_second_process_sees_decisions_already_recorded() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("docflow.db");

    let left_pool = open(&path).await;
    let right_pool = open(&path).await;
    seed_demo_participants(&left_pool).await.expect("seed");

    let left = service(&left_pool);
    let right = service(&right_pool);

    let document_id = left.create_document(expense_report()).await.expect("create");
    left.submit_for_approval(document_id).await.expect("submit");
    left.decide(request(document_id, 1, DecisionKind::Approve, None)).await.expect("approve");

    let error = right
        .decide(request(document_id, 1, DecisionKind::Approve, None))
        .await
        .expect_err("the step is already decided");
    assert!(matches!(error, ApplicationError::Domain(DomainError::Routing(_))));

    let outcome = right
        .decide(request(document_id, 2, DecisionKind::Reject, Some("over budget")))
        .await
        .expect("consent rejection");
    assert_eq!(outcome.document_status, DocumentStatus::Rejected);

    let stored = left.get_document(document_id).await.expect("document");
    assert_eq!(stored.status, DocumentStatus::Rejected);

    left_pool.close().await;
    right_pool.close().await;
}

/// Submits a line of [U1 mandatory, U2 consent] directly through the repository.
async fn submitted_consent_line(repository: &SqlDocumentRepository) -> Document {
    let mut document = repository
        .insert(NewDocument {
            template_id: TemplateId(3),
            title: "Expense report".to_string(),
            content: "<p>conference travel</p>".to_string(),
            created_by: ActorId(100),
            created_at: Utc::now(),
            line: ApprovalLine::from_steps(vec![
                ApprovalStep::pending(1, ActorId(1), StepRole::Mandatory),
                ApprovalStep::pending(2, ActorId(2), StepRole::Consent),
            ]),
        })
        .await
        .expect("insert");
    document.transition_to(DocumentStatus::InProgress, Utc::now()).expect("submit");
    repository.save_submission(&document).await.expect("save submission");
    document
}

#[tokio::test]
async fn a_stale_decision_cannot_reopen_a_rejected_document() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("docflow.db");

    let left_pool = open(&path).await;
    let right_pool = open(&path).await;
    let left = SqlDocumentRepository::new(left_pool.clone());
    let right = SqlDocumentRepository::new(right_pool.clone());

    let document = submitted_consent_line(&left).await;

    let mut left_copy = left.find_by_id(document.id).await.expect("load").expect("present");
    let mut right_copy = right.find_by_id(document.id).await.expect("load").expect("present");

    let rejection = ApprovalRouter::apply(
        &mut left_copy,
        ActorId(2),
        DecisionKind::Reject,
        Some("over budget"),
        Utc::now(),
    )
    .expect("consent rejects");
    left.save_decision(&left_copy, &rejection.settled_step).await.expect("save rejection");

    let approval =
        ApprovalRouter::apply(&mut right_copy, ActorId(1), DecisionKind::Approve, None, Utc::now())
            .expect("stale copy still routes");
    let error = right
        .save_decision(&right_copy, &approval.settled_step)
        .await
        .expect_err("stale write must be refused");
    assert!(matches!(error, StoreError::Conflict(_)));

    let stored = left.find_by_id(document.id).await.expect("load").expect("present");
    assert_eq!(stored.status, DocumentStatus::Rejected);
    assert!(stored.settled_at.is_some());
    assert_eq!(stored.line.step(1).map(|step| step.decision), Some(StepDecision::Pending));

    left_pool.close().await;
    right_pool.close().await;
}

#[tokio::test]
async fn a_stale_decision_cannot_leave_a_finished_line_in_progress() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("docflow.db");

    let left_pool = open(&path).await;
    let right_pool = open(&path).await;
    let left = SqlDocumentRepository::new(left_pool.clone());
    let right = SqlDocumentRepository::new(right_pool.clone());

    let document = submitted_consent_line(&left).await;

    let mut left_copy = left.find_by_id(document.id).await.expect("load").expect("present");
    let mut right_copy = right.find_by_id(document.id).await.expect("load").expect("present");

    let consent =
        ApprovalRouter::apply(&mut left_copy, ActorId(2), DecisionKind::Approve, None, Utc::now())
            .expect("consent approves");
    left.save_decision(&left_copy, &consent.settled_step).await.expect("save consent");

    // The stale copy still sees the consent pending and derives IN_PROGRESS.
    let approval =
        ApprovalRouter::apply(&mut right_copy, ActorId(1), DecisionKind::Approve, None, Utc::now())
            .expect("stale copy still routes");
    assert_eq!(approval.document_status, DocumentStatus::InProgress);
    let error = right
        .save_decision(&right_copy, &approval.settled_step)
        .await
        .expect_err("stale write must be refused");
    assert!(matches!(error, StoreError::Conflict(_)));

    let stored = right.find_by_id(document.id).await.expect("load").expect("present");
    assert_eq!(stored.status, DocumentStatus::InProgress);
    assert_eq!(stored.line.step(1).map(|step| step.decision), Some(StepDecision::Pending));
    assert_eq!(stored.line.step(2).map(|step| step.decision), Some(StepDecision::Approved));

    left_pool.close().await;
    right_pool.close().await;
}
