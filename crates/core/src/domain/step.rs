use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::ActorId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Approves in line order; a rejection halts the document.
    Mandatory,
    /// Approves out of order; a rejection still halts the document.
    Consent,
    /// Acknowledges only; never blocks and never halts.
    Reference,
}

impl StepRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Consent => "consent",
            Self::Reference => "reference",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mandatory" => Some(Self::Mandatory),
            "consent" => Some(Self::Consent),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn halts_on_rejection(&self) -> bool {
        matches!(self, Self::Mandatory | Self::Consent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDecision {
    Pending,
    Approved,
    Rejected,
    Acknowledged,
}

impl StepDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Acknowledged => "acknowledged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "acknowledged" => Some(Self::Acknowledged),
            _ => None,
        }
    }
}

/// The verb an actor submits against a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Acknowledge,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Acknowledge => "ack",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "ack" | "acknowledge" => Some(Self::Acknowledge),
            _ => None,
        }
    }

    pub fn outcome(&self) -> StepDecision {
        match self {
            Self::Approve => StepDecision::Approved,
            Self::Reject => StepDecision::Rejected,
            Self::Acknowledge => StepDecision::Acknowledged,
        }
    }

    pub fn allowed_for(&self, role: StepRole) -> bool {
        match role {
            StepRole::Mandatory | StepRole::Consent => matches!(self, Self::Approve | Self::Reject),
            StepRole::Reference => matches!(self, Self::Acknowledge),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub order: u32,
    pub approver_id: ActorId,
    pub role: StepRole,
    pub decision: StepDecision,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalStep {
    pub fn pending(order: u32, approver_id: ActorId, role: StepRole) -> Self {
        Self {
            order,
            approver_id,
            role,
            decision: StepDecision::Pending,
            comment: None,
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.decision == StepDecision::Pending
    }

    /// True once the step reached the decision that lets the document complete.
    pub fn is_satisfied(&self) -> bool {
        match self.role {
            StepRole::Mandatory | StepRole::Consent => self.decision == StepDecision::Approved,
            StepRole::Reference => self.decision == StepDecision::Acknowledged,
        }
    }

    pub fn is_halting_rejection(&self) -> bool {
        self.role.halts_on_rejection() && self.decision == StepDecision::Rejected
    }
}
