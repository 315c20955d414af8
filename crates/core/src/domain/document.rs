use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::line::ApprovalLine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DOC-{}", self.0)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TPL-{}", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    InProgress,
    Completed,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid document transition from {from:?} to {to:?}")]
pub struct DocumentTransitionError {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

/// A document routed through its approval line.
///
/// The line is owned by value; steps reference approvers by id only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub template_id: TemplateId,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub line: ApprovalLine,
}

/// A validated document that has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDocument {
    pub template_id: TemplateId,
    pub title: String,
    pub content: String,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub line: ApprovalLine,
}

impl Document {
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self.status, next),
            (DocumentStatus::Draft, DocumentStatus::InProgress)
                | (DocumentStatus::InProgress, DocumentStatus::Completed)
                | (DocumentStatus::InProgress, DocumentStatus::Rejected)
        )
    }

    pub fn transition_to(
        &mut self,
        next: DocumentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DocumentTransitionError> {
        if !self.can_transition_to(next) {
            return Err(DocumentTransitionError { from: self.status, to: next });
        }

        match next {
            DocumentStatus::InProgress => self.submitted_at = Some(at),
            DocumentStatus::Completed | DocumentStatus::Rejected => self.settled_at = Some(at),
            DocumentStatus::Draft => {}
        }
        self.status = next;
        Ok(())
    }

    /// Every distinct actor on the line, in line order.
    pub fn participants(&self) -> Vec<ActorId> {
        let mut seen = Vec::new();
        for step in self.line.steps() {
            if !seen.contains(&step.approver_id) {
                seen.push(step.approver_id);
            }
        }
        seen
    }
}
