use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::repository::{DocumentRepository, StoreError};
use crate::domain::document::{ActorId, Document, DocumentId, DocumentStatus, NewDocument};
use crate::domain::step::ApprovalStep;

pub struct InMemoryDocumentRepository {
    next_id: AtomicI64,
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl Default for InMemoryDocumentRepository {
    fn default() -> Self {
        Self { next_id: AtomicI64::new(1), documents: RwLock::new(BTreeMap::new()) }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        let id = DocumentId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let stored = Document {
            id,
            template_id: document.template_id,
            title: document.title,
            content: document.content,
            status: DocumentStatus::Draft,
            created_by: document.created_by,
            created_at: document.created_at,
            submitted_at: None,
            settled_at: None,
            line: document.line,
        };

        let mut documents = self.documents.write().await;
        documents.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&id).cloned())
    }

    async fn save_submission(&self, document: &Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document.id) {
            Some(stored) => {
                *stored = document.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("document {} is not stored", document.id))),
        }
    }

    async fn save_decision(
        &self,
        document: &Document,
        _step: &ApprovalStep,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document.id) {
            Some(stored) => {
                *stored = document.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("document {} is not stored", document.id))),
        }
    }

    async fn list_by_author(&self, author_id: ActorId) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        let mut authored: Vec<Document> =
            documents.values().filter(|doc| doc.created_by == author_id).cloned().collect();
        authored.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(authored)
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: ActorId,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|doc| doc.status == DocumentStatus::InProgress)
            .filter(|doc| doc.line.steps_for(approver_id).any(ApprovalStep::is_pending))
            .cloned()
            .collect())
    }
}
