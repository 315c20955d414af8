use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::approvals::router::{ApprovalRouter, RoutingOutcome};
use crate::domain::document::{ActorId, Document, DocumentId, DocumentStatus, TemplateId};
use crate::domain::step::{StepDecision, StepRole};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ApprovalRequested {
        recipient: ActorId,
        document_id: DocumentId,
        title: String,
        step_order: u32,
        role: StepRole,
    },
    StepDecided {
        recipient: ActorId,
        document_id: DocumentId,
        actor_id: ActorId,
        step_order: u32,
        role: StepRole,
        decision: StepDecision,
        comment: Option<String>,
    },
    DocumentSettled {
        recipient: ActorId,
        document_id: DocumentId,
        title: String,
        status: DocumentStatus,
        comment: Option<String>,
    },
}

impl Notification {
    pub fn recipient(&self) -> ActorId {
        match self {
            Self::ApprovalRequested { recipient, .. }
            | Self::StepDecided { recipient, .. }
            | Self::DocumentSettled { recipient, .. } => *recipient,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::ApprovalRequested { document_id, .. }
            | Self::StepDecided { document_id, .. }
            | Self::DocumentSettled { document_id, .. } => *document_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::StepDecided { .. } => "step_decided",
            Self::DocumentSettled { .. } => "document_settled",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget delivery of workflow notifications (mail, chat, push).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("domain hook failed: {0}")]
pub struct HookError(pub String);

/// Downstream effect of a settled document, e.g. turning an approved leave
/// request into a leave record.
#[async_trait]
pub trait DocumentHook: Send + Sync {
    async fn invoke(&self, document: &Document, comment: Option<&str>) -> Result<(), HookError>;
}

#[derive(Clone, Default)]
pub struct TemplateHooks {
    pub on_completed: Option<Arc<dyn DocumentHook>>,
    pub on_rejected: Option<Arc<dyn DocumentHook>>,
}

pub trait DomainHookRegistry: Send + Sync {
    fn hooks_for(&self, template_id: TemplateId) -> Option<TemplateHooks>;
}

#[derive(Clone, Default)]
pub struct StaticHookRegistry {
    hooks: HashMap<TemplateId, TemplateHooks>,
}

impl StaticHookRegistry {
    pub fn on_completed(mut self, template_id: TemplateId, hook: Arc<dyn DocumentHook>) -> Self {
        self.hooks.entry(template_id).or_default().on_completed = Some(hook);
        self
    }

    pub fn on_rejected(mut self, template_id: TemplateId, hook: Arc<dyn DocumentHook>) -> Self {
        self.hooks.entry(template_id).or_default().on_rejected = Some(hook);
        self
    }
}

impl DomainHookRegistry for StaticHookRegistry {
    fn hooks_for(&self, template_id: TemplateId) -> Option<TemplateHooks> {
        self.hooks.get(&template_id).cloned()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Completed,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "id", rename_all = "snake_case")]
pub enum DispatchTarget {
    Recipient(ActorId),
    Hook(HookKind),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub target: DispatchTarget,
    pub effect: &'static str,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: Vec<(ActorId, &'static str)>,
    pub hook_invoked: Option<HookKind>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs side effects once a routing decision is durable.
///
/// Order within one dispatch is fixed: `StepDecided` fan-out, then either
/// `ApprovalRequested` for newly actionable approvers or `DocumentSettled` for
/// the author, then the template's domain hook. A failing recipient or hook is
/// logged and recorded in the report; it never aborts the remaining effects.
pub struct SideEffectDispatcher {
    sink: Arc<dyn NotificationSink>,
    hooks: Arc<dyn DomainHookRegistry>,
    notify_participants: bool,
}

impl SideEffectDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, hooks: Arc<dyn DomainHookRegistry>) -> Self {
        Self { sink, hooks, notify_participants: true }
    }

    /// When disabled, `StepDecided` only reaches the document author.
    pub fn notify_participants(mut self, enabled: bool) -> Self {
        self.notify_participants = enabled;
        self
    }

    pub async fn dispatch_submitted(&self, document: &Document) -> DispatchReport {
        let mut report = DispatchReport::default();

        for step in ApprovalRouter::actionable(document) {
            let notification = Notification::ApprovalRequested {
                recipient: step.approver_id,
                document_id: document.id,
                title: document.title.clone(),
                step_order: step.order,
                role: step.role,
            };
            self.deliver(notification, &mut report).await;
        }

        report
    }

    pub async fn dispatch(&self, document: &Document, outcome: &RoutingOutcome) -> DispatchReport {
        let mut report = DispatchReport::default();
        let settled = &outcome.settled_step;

        for recipient in self.step_decided_recipients(document, settled.approver_id) {
            let notification = Notification::StepDecided {
                recipient,
                document_id: document.id,
                actor_id: settled.approver_id,
                step_order: settled.order,
                role: settled.role,
                decision: settled.decision,
                comment: settled.comment.clone(),
            };
            self.deliver(notification, &mut report).await;
        }

        match outcome.document_status {
            DocumentStatus::InProgress => {
                for step in &outcome.next_actionable_steps {
                    let notification = Notification::ApprovalRequested {
                        recipient: step.approver_id,
                        document_id: document.id,
                        title: document.title.clone(),
                        step_order: step.order,
                        role: step.role,
                    };
                    self.deliver(notification, &mut report).await;
                }
            }
            DocumentStatus::Completed | DocumentStatus::Rejected => {
                let notification = Notification::DocumentSettled {
                    recipient: document.created_by,
                    document_id: document.id,
                    title: document.title.clone(),
                    status: outcome.document_status,
                    comment: settled.comment.clone(),
                };
                self.deliver(notification, &mut report).await;
            }
            DocumentStatus::Draft => {}
        }

        self.run_hook(document, outcome, &mut report).await;
        report
    }

    fn step_decided_recipients(&self, document: &Document, actor_id: ActorId) -> Vec<ActorId> {
        let mut recipients = vec![document.created_by];
        if self.notify_participants {
            recipients.extend(document.participants());
        }

        let mut seen = HashSet::new();
        recipients
            .into_iter()
            .filter(|recipient| *recipient != actor_id)
            .filter(|recipient| seen.insert(*recipient))
            .collect()
    }

    async fn deliver(&self, notification: Notification, report: &mut DispatchReport) {
        let recipient = notification.recipient();
        let kind = notification.kind();

        match self.sink.notify(&notification).await {
            Ok(()) => report.delivered.push((recipient, kind)),
            Err(error) => {
                warn!(
                    event_name = "docflow.dispatch.notification_failed",
                    document_id = %notification.document_id(),
                    recipient = %recipient,
                    notification = kind,
                    error = %error,
                    "notification delivery failed; routing decision is unaffected"
                );
                report.failures.push(DispatchFailure {
                    target: DispatchTarget::Recipient(recipient),
                    effect: kind,
                    error: error.to_string(),
                });
            }
        }
    }

    async fn run_hook(
        &self,
        document: &Document,
        outcome: &RoutingOutcome,
        report: &mut DispatchReport,
    ) {
        let kind = match outcome.document_status {
            DocumentStatus::Completed => HookKind::Completed,
            DocumentStatus::Rejected => HookKind::Rejected,
            DocumentStatus::Draft | DocumentStatus::InProgress => return,
        };

        let hook = self.hooks.hooks_for(document.template_id).and_then(|hooks| match kind {
            HookKind::Completed => hooks.on_completed,
            HookKind::Rejected => hooks.on_rejected,
        });
        let Some(hook) = hook else {
            debug!(
                event_name = "docflow.dispatch.hook_absent",
                document_id = %document.id,
                template_id = %document.template_id,
                hook = ?kind,
                "no domain hook registered for template"
            );
            return;
        };

        // Spawned so a panicking hook surfaces as a join error instead of
        // unwinding through the caller after the decision is durable.
        let owned_document = document.clone();
        let comment = outcome.settled_step.comment.clone();
        let joined = tokio::spawn(async move {
            hook.invoke(&owned_document, comment.as_deref()).await
        })
        .await;

        let error = match joined {
            Ok(Ok(())) => {
                info!(
                    event_name = "docflow.dispatch.hook_invoked",
                    document_id = %document.id,
                    template_id = %document.template_id,
                    hook = ?kind,
                    "domain hook invoked"
                );
                report.hook_invoked = Some(kind);
                return;
            }
            Ok(Err(error)) => error.to_string(),
            Err(join_error) if join_error.is_panic() => format!("hook panicked: {join_error}"),
            Err(join_error) => format!("hook task aborted: {join_error}"),
        };

        warn!(
            event_name = "docflow.dispatch.hook_failed",
            document_id = %document.id,
            template_id = %document.template_id,
            hook = ?kind,
            error = %error,
            "domain hook failed; routing decision is unaffected"
        );
        report.failures.push(DispatchFailure {
            target: DispatchTarget::Hook(kind),
            effect: "domain_hook",
            error,
        });
    }
}

/// Writes notifications to the structured log. Default sink when no
/// transport is wired.
#[derive(Clone, Debug, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            event_name = "docflow.notification.sent",
            document_id = %notification.document_id(),
            recipient = %notification.recipient(),
            notification = notification.kind(),
            "workflow notification"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    sent: Arc<Mutex<Vec<Notification>>>,
    unreachable: Arc<Mutex<HashSet<ActorId>>>,
}

impl InMemoryNotificationSink {
    pub fn notifications(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Makes every delivery to `recipient` fail.
    pub fn mark_unreachable(&self, recipient: ActorId) {
        match self.unreachable.lock() {
            Ok(mut unreachable) => unreachable.insert(recipient),
            Err(poisoned) => poisoned.into_inner().insert(recipient),
        };
    }

    fn is_unreachable(&self, recipient: ActorId) -> bool {
        match self.unreachable.lock() {
            Ok(unreachable) => unreachable.contains(&recipient),
            Err(poisoned) => poisoned.into_inner().contains(&recipient),
        }
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.is_unreachable(notification.recipient()) {
            return Err(NotifyError(format!("{} is unreachable", notification.recipient())));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}
