use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::participants::ParticipantRegistry;
use crate::domain::document::{ActorId, TemplateId};
use crate::domain::line::ApprovalLine;
use crate::domain::step::{ApprovalStep, StepRole};

pub const DEFAULT_MAX_STEPS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverAssignment {
    pub approver_id: ActorId,
    pub role: StepRole,
}

impl ApproverAssignment {
    pub fn mandatory(approver_id: ActorId) -> Self {
        Self { approver_id, role: StepRole::Mandatory }
    }

    pub fn consent(approver_id: ActorId) -> Self {
        Self { approver_id, role: StepRole::Consent }
    }

    pub fn reference(approver_id: ActorId) -> Self {
        Self { approver_id, role: StepRole::Reference }
    }
}

/// Caller input for a new document. Assignment order is step order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub template_id: TemplateId,
    pub title: String,
    pub content: String,
    pub author_id: ActorId,
    pub assignments: Vec<ApproverAssignment>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidLineError {
    #[error("document title must not be blank")]
    BlankTitle,
    #[error("approval line must contain at least one approver")]
    EmptyLine,
    #[error("approval line has {len} steps, exceeding the limit of {max}")]
    TooManySteps { len: usize, max: usize },
    #[error("approval line must contain at least one mandatory approver")]
    NoMandatoryApprover,
    #[error("approver {approver_id} is assigned more than once as {role:?}")]
    DuplicateAssignment { approver_id: ActorId, role: StepRole },
    #[error("approver {approver_id} is not a known participant")]
    UnknownApprover { approver_id: ActorId },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LineBuildError {
    #[error(transparent)]
    Invalid(#[from] InvalidLineError),
    #[error("participant lookup failed for {approver_id}: {message}")]
    Registry { approver_id: ActorId, message: String },
}

pub struct ApprovalLineBuilder<'a> {
    registry: &'a dyn ParticipantRegistry,
    max_steps: usize,
}

impl<'a> ApprovalLineBuilder<'a> {
    pub fn new(registry: &'a dyn ParticipantRegistry) -> Self {
        Self { registry, max_steps: DEFAULT_MAX_STEPS }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Structural checks that need no registry lookup.
    pub fn validate_shape(&self, draft: &DocumentDraft) -> Result<(), InvalidLineError> {
        if draft.title.trim().is_empty() {
            return Err(InvalidLineError::BlankTitle);
        }

        let assignments = &draft.assignments;
        if assignments.is_empty() {
            return Err(InvalidLineError::EmptyLine);
        }

        if assignments.len() > self.max_steps {
            return Err(InvalidLineError::TooManySteps {
                len: assignments.len(),
                max: self.max_steps,
            });
        }

        if !assignments.iter().any(|assignment| assignment.role == StepRole::Mandatory) {
            return Err(InvalidLineError::NoMandatoryApprover);
        }

        let mut seen = HashSet::new();
        for assignment in assignments {
            if !seen.insert((assignment.approver_id, assignment.role)) {
                return Err(InvalidLineError::DuplicateAssignment {
                    approver_id: assignment.approver_id,
                    role: assignment.role,
                });
            }
        }

        Ok(())
    }

    pub async fn build(&self, draft: &DocumentDraft) -> Result<ApprovalLine, LineBuildError> {
        self.validate_shape(draft)?;

        let mut checked = HashSet::new();
        for assignment in &draft.assignments {
            if !checked.insert(assignment.approver_id) {
                continue;
            }

            let known = self.registry.exists(assignment.approver_id).await.map_err(|message| {
                LineBuildError::Registry { approver_id: assignment.approver_id, message }
            })?;
            if !known {
                return Err(InvalidLineError::UnknownApprover {
                    approver_id: assignment.approver_id,
                }
                .into());
            }
        }

        let steps = draft
            .assignments
            .iter()
            .zip(1u32..)
            .map(|(assignment, order)| {
                ApprovalStep::pending(order, assignment.approver_id, assignment.role)
            })
            .collect();

        Ok(ApprovalLine::from_steps(steps))
    }
}
