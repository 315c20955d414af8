use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::status::DocumentStateMachine;
use crate::approvals::step_machine::{StepDecisionError, StepStateMachine};
use crate::domain::document::{
    ActorId, Document, DocumentId, DocumentStatus, DocumentTransitionError,
};
use crate::domain::line::{ApprovalLine, LineIntegrityError};
use crate::domain::step::{ApprovalStep, DecisionKind, StepRole};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("document {document_id} is {status:?}, not in progress")]
    DocumentNotInProgress { document_id: DocumentId, status: DocumentStatus },
    #[error("{actor_id} has no actionable step on document {document_id}")]
    NoActionableStep { document_id: DocumentId, actor_id: ActorId },
    #[error("document {document_id} has a corrupt approval line: {source}")]
    LineIntegrity {
        document_id: DocumentId,
        #[source]
        source: LineIntegrityError,
    },
    #[error(transparent)]
    Step(#[from] StepDecisionError),
    #[error(transparent)]
    Transition(#[from] DocumentTransitionError),
}

/// Result of applying one decision. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOutcome {
    pub document_id: DocumentId,
    pub document_status: DocumentStatus,
    pub settled_step: ApprovalStep,
    /// Steps that became actionable because of this decision.
    pub next_actionable_steps: Vec<ApprovalStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionableStep {
    pub document_id: DocumentId,
    pub step_order: u32,
}

/// Pending steps that may be decided now, in line order.
///
/// A mandatory step waits for every earlier mandatory step to be approved.
/// Consent and reference steps never wait.
pub fn actionable_steps(line: &ApprovalLine) -> Vec<&ApprovalStep> {
    let mut mandatory_blocked = false;
    let mut actionable = Vec::new();

    for step in line.steps() {
        match step.role {
            StepRole::Mandatory => {
                if step.is_pending() && !mandatory_blocked {
                    actionable.push(step);
                }
                if !step.is_satisfied() {
                    mandatory_blocked = true;
                }
            }
            StepRole::Consent | StepRole::Reference => {
                if step.is_pending() {
                    actionable.push(step);
                }
            }
        }
    }

    actionable
}

pub struct ApprovalRouter;

impl ApprovalRouter {
    /// Actionable steps of a document; only in-progress documents have any.
    pub fn actionable(document: &Document) -> Vec<&ApprovalStep> {
        if document.status != DocumentStatus::InProgress {
            return Vec::new();
        }
        actionable_steps(&document.line)
    }

    pub fn actionable_for(document: &Document, actor_id: ActorId) -> Vec<ActionableStep> {
        Self::actionable(document)
            .into_iter()
            .filter(|step| step.approver_id == actor_id)
            .map(|step| ActionableStep { document_id: document.id, step_order: step.order })
            .collect()
    }

    /// Applies `decision` by `actor_id` to the document in place.
    ///
    /// On error the document is left untouched.
    pub fn apply(
        document: &mut Document,
        actor_id: ActorId,
        decision: DecisionKind,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<RoutingOutcome, RoutingError> {
        if document.status != DocumentStatus::InProgress {
            return Err(RoutingError::DocumentNotInProgress {
                document_id: document.id,
                status: document.status,
            });
        }

        let document_id = document.id;
        document
            .line
            .verify_integrity()
            .map_err(|source| RoutingError::LineIntegrity { document_id, source })?;

        let before: Vec<u32> =
            actionable_steps(&document.line).into_iter().map(|step| step.order).collect();

        let Some(target) = select_step(&document.line, actor_id, decision).cloned() else {
            return Err(match settled_step_of(&document.line, actor_id, decision) {
                Some(step) => StepDecisionError::AlreadyDecided {
                    order: step.order,
                    decision: step.decision,
                }
                .into(),
                None => RoutingError::NoActionableStep { document_id, actor_id },
            });
        };

        let decided = StepStateMachine::decide(&target, actor_id, decision, comment, at)?;

        let mut updated = document.clone();
        if updated.line.replace(decided.clone()).is_none() {
            return Err(RoutingError::LineIntegrity {
                document_id,
                source: LineIntegrityError::MissingStep { order: decided.order },
            });
        }

        let derived = DocumentStateMachine::derive_status(&updated.line);
        if derived != updated.status {
            updated.transition_to(derived, at)?;
        }

        let next_actionable_steps = if updated.status == DocumentStatus::InProgress {
            actionable_steps(&updated.line)
                .into_iter()
                .filter(|step| !before.contains(&step.order))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        *document = updated;

        Ok(RoutingOutcome {
            document_id,
            document_status: document.status,
            settled_step: decided,
            next_actionable_steps,
        })
    }
}

/// The actor's actionable step for `decision`.
///
/// An actor holding several actionable steps acts on the lowest-order one whose
/// role accepts the decision. When none does, the lowest-order actionable step
/// is returned so the step machine reports the role mismatch.
fn select_step(
    line: &ApprovalLine,
    actor_id: ActorId,
    decision: DecisionKind,
) -> Option<&ApprovalStep> {
    let candidates: Vec<&ApprovalStep> = actionable_steps(line)
        .into_iter()
        .filter(|step| step.approver_id == actor_id)
        .collect();

    candidates
        .iter()
        .copied()
        .find(|step| decision.allowed_for(step.role))
        .or_else(|| candidates.first().copied())
}

/// The actor's already-settled step when every step they hold is decided.
/// Distinguishes a repeated decision from acting before one's turn.
fn settled_step_of(
    line: &ApprovalLine,
    actor_id: ActorId,
    decision: DecisionKind,
) -> Option<&ApprovalStep> {
    let held: Vec<&ApprovalStep> = line.steps_for(actor_id).collect();
    if held.is_empty() || held.iter().any(|step| step.is_pending()) {
        return None;
    }

    held.iter()
        .copied()
        .find(|step| decision.allowed_for(step.role))
        .or_else(|| held.first().copied())
}
