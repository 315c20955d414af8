use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::locks::DocumentLocks;
use super::repository::{DocumentRepository, StoreError};
use crate::approvals::{
    ActionableStep, ApprovalLineBuilder, ApprovalRouter, DocumentDraft, LineBuildError,
    ParticipantRegistry, RoutingError, RoutingOutcome, SideEffectDispatcher, DEFAULT_MAX_STEPS,
};
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::document::{ActorId, Document, DocumentId, DocumentStatus, NewDocument};
use crate::domain::step::{ApprovalStep, DecisionKind};
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub document_id: DocumentId,
    pub actor_id: ActorId,
    pub decision: DecisionKind,
    pub comment: Option<String>,
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<LineBuildError> for ApplicationError {
    fn from(value: LineBuildError) -> Self {
        match value {
            LineBuildError::Invalid(invalid) => Self::Domain(DomainError::InvalidLine(invalid)),
            LineBuildError::Registry { .. } => Self::Integration(value.to_string()),
        }
    }
}

/// Entry point for document approval workflows.
///
/// Every mutating call holds the document's lock from load through persist.
/// Side effects run after the lock is released and never fail the call.
pub struct ApprovalService {
    documents: Arc<dyn DocumentRepository>,
    participants: Arc<dyn ParticipantRegistry>,
    dispatcher: SideEffectDispatcher,
    audit: Arc<dyn AuditSink>,
    locks: DocumentLocks,
    max_steps: usize,
}

impl ApprovalService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        participants: Arc<dyn ParticipantRegistry>,
        dispatcher: SideEffectDispatcher,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            documents,
            participants,
            dispatcher,
            audit,
            locks: DocumentLocks::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub async fn create_document(&self, draft: DocumentDraft) -> Result<DocumentId, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let builder =
            ApprovalLineBuilder::new(self.participants.as_ref()).with_max_steps(self.max_steps);

        let line = match builder.build(&draft).await {
            Ok(line) => line,
            Err(error) => {
                warn!(
                    event_name = "docflow.document.create_rejected",
                    correlation_id = %correlation_id,
                    author_id = %draft.author_id,
                    error = %error,
                    "document draft rejected"
                );
                self.audit.emit(
                    AuditEvent::new(
                        None,
                        &correlation_id,
                        "document.create_rejected",
                        AuditCategory::Document,
                        draft.author_id.to_string(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("reason", error.to_string()),
                );
                return Err(error.into());
            }
        };

        let document = self
            .documents
            .insert(NewDocument {
                template_id: draft.template_id,
                title: draft.title,
                content: draft.content,
                created_by: draft.author_id,
                created_at: Utc::now(),
                line,
            })
            .await?;

        info!(
            event_name = "docflow.document.created",
            correlation_id = %correlation_id,
            document_id = %document.id,
            template_id = %document.template_id,
            steps = document.line.len(),
            "document created"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(document.id),
                &correlation_id,
                "document.created",
                AuditCategory::Document,
                document.created_by.to_string(),
                AuditOutcome::Success,
            )
            .with_metadata("template_id", document.template_id.to_string())
            .with_metadata("steps", document.line.len().to_string()),
        );

        Ok(document.id)
    }

    pub async fn submit_for_approval(
        &self,
        document_id: DocumentId,
    ) -> Result<DocumentId, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();

        let document = {
            let _guard = self.locks.acquire(document_id).await;
            let mut document = self.load(document_id).await?;

            if document.status != DocumentStatus::Draft {
                return Err(DomainError::AlreadySubmitted {
                    document_id,
                    status: document.status,
                }
                .into());
            }

            document
                .transition_to(DocumentStatus::InProgress, Utc::now())
                .map_err(DomainError::from)?;
            self.documents.save_submission(&document).await?;
            document
        };

        info!(
            event_name = "docflow.document.submitted",
            correlation_id = %correlation_id,
            document_id = %document_id,
            "document submitted for approval"
        );
        self.audit.emit(AuditEvent::new(
            Some(document_id),
            &correlation_id,
            "document.submitted",
            AuditCategory::Document,
            document.created_by.to_string(),
            AuditOutcome::Success,
        ));

        let report = self.dispatcher.dispatch_submitted(&document).await;
        self.record_dispatch(&correlation_id, document_id, report.failures.len());

        Ok(document_id)
    }

    pub async fn decide(&self, request: DecisionRequest) -> Result<RoutingOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let DecisionRequest { document_id, actor_id, decision, comment } = request;

        let (document, outcome) = {
            let _guard = self.locks.acquire(document_id).await;
            let mut document = self.load(document_id).await?;

            let outcome = match ApprovalRouter::apply(
                &mut document,
                actor_id,
                decision,
                comment.as_deref(),
                Utc::now(),
            ) {
                Ok(outcome) => outcome,
                Err(routing_error) => {
                    self.record_refused_decision(
                        &correlation_id,
                        document_id,
                        actor_id,
                        decision,
                        &routing_error,
                    );
                    return Err(DomainError::from(routing_error).into());
                }
            };

            self.documents.save_decision(&document, &outcome.settled_step).await?;
            (document, outcome)
        };

        info!(
            event_name = "docflow.routing.decision_applied",
            correlation_id = %correlation_id,
            document_id = %document_id,
            actor_id = %actor_id,
            step_order = outcome.settled_step.order,
            decision = decision.as_str(),
            document_status = outcome.document_status.as_str(),
            "approval decision applied"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(document_id),
                &correlation_id,
                "routing.decision_applied",
                AuditCategory::Routing,
                actor_id.to_string(),
                AuditOutcome::Success,
            )
            .with_metadata("step_order", outcome.settled_step.order.to_string())
            .with_metadata("decision", decision.as_str())
            .with_metadata("document_status", outcome.document_status.as_str()),
        );

        let report = self.dispatcher.dispatch(&document, &outcome).await;
        self.record_dispatch(&correlation_id, document_id, report.failures.len());

        Ok(outcome)
    }

    pub async fn get_approval_line(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<ApprovalStep>, ApplicationError> {
        let document = self.load(document_id).await?;
        Ok(document.line.steps().to_vec())
    }

    pub async fn list_actionable_for(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<ActionableStep>, ApplicationError> {
        let documents = self.documents.list_pending_for_approver(actor_id).await?;
        Ok(documents
            .iter()
            .flat_map(|document| ApprovalRouter::actionable_for(document, actor_id))
            .collect())
    }

    pub async fn get_document(&self, document_id: DocumentId) -> Result<Document, ApplicationError> {
        self.load(document_id).await
    }

    pub async fn list_documents_by_author(
        &self,
        author_id: ActorId,
    ) -> Result<Vec<Document>, ApplicationError> {
        Ok(self.documents.list_by_author(author_id).await?)
    }

    async fn load(&self, document_id: DocumentId) -> Result<Document, ApplicationError> {
        self.documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| DomainError::DocumentNotFound(document_id).into())
    }

    fn record_refused_decision(
        &self,
        correlation_id: &str,
        document_id: DocumentId,
        actor_id: ActorId,
        decision: DecisionKind,
        routing_error: &RoutingError,
    ) {
        if matches!(routing_error, RoutingError::LineIntegrity { .. }) {
            error!(
                event_name = "docflow.routing.line_corrupt",
                correlation_id = %correlation_id,
                document_id = %document_id,
                actor_id = %actor_id,
                error = %routing_error,
                "approval line failed integrity check"
            );
        } else {
            info!(
                event_name = "docflow.routing.decision_refused",
                correlation_id = %correlation_id,
                document_id = %document_id,
                actor_id = %actor_id,
                decision = decision.as_str(),
                error = %routing_error,
                "approval decision refused"
            );
        }

        let outcome = if matches!(routing_error, RoutingError::LineIntegrity { .. }) {
            AuditOutcome::Failed
        } else {
            AuditOutcome::Rejected
        };
        self.audit.emit(
            AuditEvent::new(
                Some(document_id),
                correlation_id,
                "routing.decision_refused",
                AuditCategory::Routing,
                actor_id.to_string(),
                outcome,
            )
            .with_metadata("decision", decision.as_str())
            .with_metadata("reason", routing_error.to_string()),
        );
    }

    fn record_dispatch(&self, correlation_id: &str, document_id: DocumentId, failures: usize) {
        if failures == 0 {
            return;
        }
        self.audit.emit(
            AuditEvent::new(
                Some(document_id),
                correlation_id,
                "dispatch.partial_failure",
                AuditCategory::Dispatch,
                "side-effect-dispatcher",
                AuditOutcome::Failed,
            )
            .with_metadata("failures", failures.to_string()),
        );
    }
}
