use thiserror::Error;

use crate::{
    approvals::{InvalidLineError, RoutingError, StepDecisionError},
    domain::document::{DocumentId, DocumentStatus, DocumentTransitionError},
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidLine(#[from] InvalidLineError),
    #[error(transparent)]
    InvalidDocumentTransition(#[from] DocumentTransitionError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("document {document_id} was already submitted (status {status:?})")]
    AlreadySubmitted { document_id: DocumentId, status: DocumentStatus },
}

impl From<StepDecisionError> for DomainError {
    fn from(value: StepDecisionError) -> Self {
        Self::Routing(RoutingError::Step(value))
    }
}

/// Coarse classification used by callers to pick a response without
/// matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    NotFound,
    Fatal,
    Unavailable,
}

impl DomainError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidLine(_) => ErrorClass::Validation,
            Self::DocumentNotFound(_) => ErrorClass::NotFound,
            Self::AlreadySubmitted { .. } | Self::InvalidDocumentTransition(_) => {
                ErrorClass::Conflict
            }
            Self::Routing(RoutingError::LineIntegrity { .. })
            | Self::Routing(RoutingError::Transition(_)) => ErrorClass::Fatal,
            Self::Routing(RoutingError::Step(StepDecisionError::CommentRequired { .. })) => {
                ErrorClass::Validation
            }
            Self::Routing(RoutingError::DocumentNotInProgress { .. })
            | Self::Routing(RoutingError::NoActionableStep { .. })
            | Self::Routing(RoutingError::Step(_)) => ErrorClass::Conflict,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Domain(domain) => domain.class(),
            Self::Persistence(_) | Self::Integration(_) => ErrorClass::Unavailable,
            Self::Configuration(_) => ErrorClass::Fatal,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "This action no longer applies to the document in its current state."
            }
            Self::NotFound { .. } => "The requested document does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let class = value.class();
        let message = value.to_string();
        match class {
            ErrorClass::Validation => Self::BadRequest { message, correlation_id },
            ErrorClass::Conflict => Self::Conflict { message, correlation_id },
            ErrorClass::NotFound => Self::NotFound { message, correlation_id },
            ErrorClass::Unavailable => Self::ServiceUnavailable { message, correlation_id },
            ErrorClass::Fatal => Self::Internal { message, correlation_id },
        }
    }
}
