pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use approvals::{
    ActionableStep, ApprovalLineBuilder, ApprovalRouter, ApproverAssignment, DocumentDraft,
    DocumentHook, DomainHookRegistry, Notification, NotificationSink, ParticipantRegistry,
    RoutingOutcome, SideEffectDispatcher, StaticHookRegistry, TemplateHooks,
};
pub use domain::document::{ActorId, Document, DocumentId, DocumentStatus, TemplateId};
pub use domain::line::ApprovalLine;
pub use domain::step::{ApprovalStep, DecisionKind, StepDecision, StepRole};
pub use errors::{ApplicationError, DomainError, ErrorClass, InterfaceError};
pub use workflow::{ApprovalService, DecisionRequest, DocumentRepository, StoreError};
