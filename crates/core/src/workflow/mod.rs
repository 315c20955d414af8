//! Document workflow service: persistence seam, per-document locking and the
//! operations exposed to callers.

pub mod locks;
pub mod memory;
pub mod repository;
pub mod service;

pub use locks::DocumentLocks;
pub use memory::InMemoryDocumentRepository;
pub use repository::{DocumentRepository, StoreError};
pub use service::{ApprovalService, DecisionRequest};
