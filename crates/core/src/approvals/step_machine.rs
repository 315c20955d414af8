use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::document::ActorId;
use crate::domain::step::{ApprovalStep, DecisionKind, StepDecision, StepRole};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StepDecisionError {
    #[error("step {order} was already decided as {decision:?}")]
    AlreadyDecided { order: u32, decision: StepDecision },
    #[error("step {order} is assigned to {expected}, not {actual}")]
    ActorMismatch { order: u32, expected: ActorId, actual: ActorId },
    #[error("{role:?} step {order} does not accept `{}`", .decision.as_str())]
    RoleNotAuthorized { order: u32, role: StepRole, decision: DecisionKind },
    #[error("rejecting step {order} requires a comment")]
    CommentRequired { order: u32 },
}

/// Legal transitions of a single step.
///
/// `Pending -> Approved | Rejected` for mandatory and consent steps,
/// `Pending -> Acknowledged` for reference steps. Every decided state is final.
pub struct StepStateMachine;

impl StepStateMachine {
    pub fn decide(
        step: &ApprovalStep,
        actor_id: ActorId,
        decision: DecisionKind,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<ApprovalStep, StepDecisionError> {
        if !step.is_pending() {
            return Err(StepDecisionError::AlreadyDecided {
                order: step.order,
                decision: step.decision,
            });
        }

        if step.approver_id != actor_id {
            return Err(StepDecisionError::ActorMismatch {
                order: step.order,
                expected: step.approver_id,
                actual: actor_id,
            });
        }

        if !decision.allowed_for(step.role) {
            return Err(StepDecisionError::RoleNotAuthorized {
                order: step.order,
                role: step.role,
                decision,
            });
        }

        let comment = comment.map(str::trim).filter(|text| !text.is_empty()).map(str::to_owned);
        if decision == DecisionKind::Reject && comment.is_none() {
            return Err(StepDecisionError::CommentRequired { order: step.order });
        }

        Ok(ApprovalStep {
            decision: decision.outcome(),
            comment,
            decided_at: Some(at),
            ..step.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{StepDecisionError, StepStateMachine};
    use crate::domain::document::ActorId;
    use crate::domain::step::{ApprovalStep, DecisionKind, StepDecision, StepRole};

    #[test]
    fn approve_sets_decision_and_timestamp() {
        let step = ApprovalStep::pending(1, ActorId(7), StepRole::Mandatory);
        let at = Utc::now();

        let decided = StepStateMachine::decide(&step, ActorId(7), DecisionKind::Approve, None, at)
            .expect("pending mandatory step can be approved");

        assert_eq!(decided.decision, StepDecision::Approved);
        assert_eq!(decided.decided_at, Some(at));
        assert_eq!(decided.comment, None);
        assert_eq!(decided.order, 1);
    }

    #[test]
    fn reject_requires_non_blank_comment() {
        let step = ApprovalStep::pending(2, ActorId(7), StepRole::Consent);

        for comment in [None, Some(""), Some("   ")] {
            let error =
                StepStateMachine::decide(&step, ActorId(7), DecisionKind::Reject, comment, Utc::now())
                    .expect_err("rejection without reason");
            assert_eq!(error, StepDecisionError::CommentRequired { order: 2 });
        }

        let decided = StepStateMachine::decide(
            &step,
            ActorId(7),
            DecisionKind::Reject,
            Some("  budget issue "),
            Utc::now(),
        )
        .expect("rejection with reason");
        assert_eq!(decided.comment.as_deref(), Some("budget issue"));
    }

    #[test]
    fn redeciding_fails_regardless_of_prior_outcome() {
        let step = ApprovalStep::pending(1, ActorId(7), StepRole::Mandatory);
        let approved =
            StepStateMachine::decide(&step, ActorId(7), DecisionKind::Approve, None, Utc::now())
                .expect("first decision");
        let first_decided_at = approved.decided_at;

        let error = StepStateMachine::decide(
            &approved,
            ActorId(7),
            DecisionKind::Reject,
            Some("changed my mind"),
            Utc::now(),
        )
        .expect_err("second decision");
        assert_eq!(
            error,
            StepDecisionError::AlreadyDecided { order: 1, decision: StepDecision::Approved }
        );

        let by_other = StepStateMachine::decide(
            &approved,
            ActorId(8),
            DecisionKind::Approve,
            None,
            Utc::now(),
        )
        .expect_err("decided step checked before actor");
        assert!(matches!(by_other, StepDecisionError::AlreadyDecided { .. }));
        assert_eq!(approved.decided_at, first_decided_at);
    }

    #[test]
    fn other_actor_cannot_decide() {
        let step = ApprovalStep::pending(3, ActorId(7), StepRole::Mandatory);
        let error =
            StepStateMachine::decide(&step, ActorId(9), DecisionKind::Approve, None, Utc::now())
                .expect_err("wrong actor");

        assert_eq!(
            error,
            StepDecisionError::ActorMismatch { order: 3, expected: ActorId(7), actual: ActorId(9) }
        );
    }

    #[test]
    fn reference_step_rejects_approve_and_reject() {
        let step = ApprovalStep::pending(4, ActorId(7), StepRole::Reference);

        for decision in [DecisionKind::Approve, DecisionKind::Reject] {
            let error = StepStateMachine::decide(
                &step,
                ActorId(7),
                decision,
                Some("not mine to decide"),
                Utc::now(),
            )
            .expect_err("reference cannot approve or reject");
            assert_eq!(
                error,
                StepDecisionError::RoleNotAuthorized {
                    order: 4,
                    role: StepRole::Reference,
                    decision,
                }
            );
        }

        let acknowledged =
            StepStateMachine::decide(&step, ActorId(7), DecisionKind::Acknowledge, None, Utc::now())
                .expect("reference acknowledges");
        assert_eq!(acknowledged.decision, StepDecision::Acknowledged);
    }
}
