use async_trait::async_trait;
use thiserror::Error;

use crate::domain::document::{ActorId, Document, DocumentId, NewDocument};
use crate::domain::step::ApprovalStep;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("stored document could not be decoded: {0}")]
    Decode(String),
    #[error("stale write rejected: {0}")]
    Conflict(String),
}

/// Persistence seam for documents and their approval lines.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Stores a new draft and assigns its id.
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError>;

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Persists the DRAFT → IN_PROGRESS transition.
    async fn save_submission(&self, document: &Document) -> Result<(), StoreError>;

    /// Writes the decided step and the document status atomically.
    async fn save_decision(
        &self,
        document: &Document,
        step: &ApprovalStep,
    ) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_by_author(&self, author_id: ActorId) -> Result<Vec<Document>, StoreError>;

    /// In-progress documents holding at least one pending step for `approver_id`.
    async fn list_pending_for_approver(
        &self,
        approver_id: ActorId,
    ) -> Result<Vec<Document>, StoreError>;
}
