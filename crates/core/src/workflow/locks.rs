use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::document::DocumentId;

const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per document id. Decisions on the same document serialize
/// across load, route and persist; different documents never contend.
#[derive(Clone, Default)]
pub struct DocumentLocks {
    inner: Arc<Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>>,
}

impl DocumentLocks {
    pub async fn acquire(&self, document_id: DocumentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.inner.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(document_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        match self.inner.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
