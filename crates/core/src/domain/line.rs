use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::document::ActorId;
use crate::domain::step::{ApprovalStep, StepRole};

/// Raised when a stored line breaks the dense `1..=N` ordering.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LineIntegrityError {
    #[error("approval line has no steps")]
    Empty,
    #[error("approval line order {order} is assigned to more than one step")]
    DuplicateOrder { order: u32 },
    #[error("approval line expected order {expected} but found {found}")]
    OrderGap { expected: u32, found: u32 },
    #[error("approval line has no step with order {order}")]
    MissingStep { order: u32 },
}

/// Ordered approval steps owned by a single document.
///
/// Steps are only mutated through the router, one decision at a time; the
/// membership and order of a line never change after creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLine {
    steps: Vec<ApprovalStep>,
}

impl ApprovalLine {
    /// Rebuilds a line from stored steps without validating it.
    pub fn from_steps(mut steps: Vec<ApprovalStep>) -> Self {
        steps.sort_by_key(|step| step.order);
        Self { steps }
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, order: u32) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.order == order)
    }

    pub fn steps_for(&self, approver_id: ActorId) -> impl Iterator<Item = &ApprovalStep> {
        self.steps.iter().filter(move |step| step.approver_id == approver_id)
    }

    pub fn steps_with_role(&self, role: StepRole) -> impl Iterator<Item = &ApprovalStep> {
        self.steps.iter().filter(move |step| step.role == role)
    }

    pub(crate) fn replace(&mut self, decided: ApprovalStep) -> Option<ApprovalStep> {
        let slot = self.steps.iter_mut().find(|step| step.order == decided.order)?;
        Some(std::mem::replace(slot, decided))
    }

    pub fn verify_integrity(&self) -> Result<(), LineIntegrityError> {
        if self.steps.is_empty() {
            return Err(LineIntegrityError::Empty);
        }

        let mut expected = 1u32;
        let mut previous: Option<u32> = None;
        for step in &self.steps {
            if previous == Some(step.order) {
                return Err(LineIntegrityError::DuplicateOrder { order: step.order });
            }
            if step.order != expected {
                return Err(LineIntegrityError::OrderGap { expected, found: step.order });
            }
            previous = Some(step.order);
            expected += 1;
        }

        Ok(())
    }
}
