use crate::domain::document::DocumentStatus;
use crate::domain::line::ApprovalLine;

/// Document-level settlement policy, kept free of I/O.
pub struct DocumentStateMachine;

impl DocumentStateMachine {
    /// Status of a submitted document given its line.
    ///
    /// A rejected mandatory or consent step halts the document regardless of
    /// what else is pending. Otherwise the document completes once every step
    /// is satisfied.
    pub fn derive_status(line: &ApprovalLine) -> DocumentStatus {
        let steps = line.steps();

        if steps.iter().any(|step| step.is_halting_rejection()) {
            return DocumentStatus::Rejected;
        }

        if !steps.is_empty() && steps.iter().all(|step| step.is_satisfied()) {
            return DocumentStatus::Completed;
        }

        DocumentStatus::InProgress
    }
}
