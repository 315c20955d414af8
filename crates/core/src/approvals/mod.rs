//! The approval routing engine.
//!
//! A document's line is validated once by [`ApprovalLineBuilder`], decided one
//! step at a time through [`StepStateMachine`], routed by [`ApprovalRouter`] and
//! settled by [`DocumentStateMachine`]. [`SideEffectDispatcher`] runs after the
//! routing decision is durable.

pub mod builder;
pub mod dispatch;
pub mod participants;
pub mod router;
pub mod status;
pub mod step_machine;

pub use builder::{
    ApprovalLineBuilder, ApproverAssignment, DocumentDraft, InvalidLineError, LineBuildError,
    DEFAULT_MAX_STEPS,
};
pub use dispatch::{
    DispatchFailure, DispatchReport, DispatchTarget, DocumentHook, DomainHookRegistry, HookError,
    HookKind, InMemoryNotificationSink, LoggingNotificationSink, Notification, NotificationSink,
    NotifyError, SideEffectDispatcher, StaticHookRegistry, TemplateHooks,
};
pub use participants::{InMemoryParticipantRegistry, ParticipantRegistry};
pub use router::{actionable_steps, ActionableStep, ApprovalRouter, RoutingError, RoutingOutcome};
pub use status::DocumentStateMachine;
pub use step_machine::{StepDecisionError, StepStateMachine};
