//! Orchestrator-specific error types

use shared::{CandidateId, ProposalId, SharedError, TaskId};
use std::time::Duration;
use thiserror::Error;

/// Failure classes used for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A dependency (index, store, transport) failed or was unreachable
    Transient,
    /// An inbound event could not be decoded or violated its contract
    MalformedInput,
    /// Admission control rejected the work
    Saturation,
    /// A single candidate's proposal could not be created or delivered
    PartialDelivery,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::Saturation => "saturation",
            ErrorKind::PartialDelivery => "partial_delivery",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Candidate lookup failed: {message}")]
    CandidateLookupError { message: String },

    #[error("Scoring failed for candidate {candidate_id}: {reason}")]
    ScoringError { candidate_id: CandidateId, reason: String },

    #[error("Proposal store operation failed: {message}")]
    ProposalStoreError { message: String },

    #[error("Proposal {proposal_id} not found")]
    ProposalNotFound { proposal_id: ProposalId },

    #[error("Delivery of proposal {proposal_id} failed: {message}")]
    DeliveryError { proposal_id: ProposalId, message: String },

    #[error("Publishing to {subject} failed: {message}")]
    PublishError { subject: String, message: String },

    #[error("Admission denied: {active} of {capacity} task slots in use")]
    AdmissionDenied { active: usize, capacity: usize },

    #[error("Task {task_id} exceeded its processing budget of {budget:?}")]
    TaskTimeout { task_id: TaskId, budget: Duration },

    #[error("Task {task_id} was cancelled")]
    Cancelled { task_id: TaskId },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Malformed event: {0}")]
    MalformedEvent(SharedError),

    #[error("Event encoding failed: {message}")]
    EncodeError { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        OrchestratorError::ConfigurationError { field: field.into() }
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        OrchestratorError::CandidateLookupError {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        OrchestratorError::ProposalStoreError {
            message: message.into(),
        }
    }

    pub fn delivery(proposal_id: ProposalId, message: impl Into<String>) -> Self {
        OrchestratorError::DeliveryError {
            proposal_id,
            message: message.into(),
        }
    }

    pub fn publish(subject: impl Into<String>, message: impl Into<String>) -> Self {
        OrchestratorError::PublishError {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn scoring(candidate_id: CandidateId, reason: impl Into<String>) -> Self {
        OrchestratorError::ScoringError {
            candidate_id,
            reason: reason.into(),
        }
    }

    /// Classify the error for logs and metrics
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::CandidateLookupError { .. }
            | OrchestratorError::ProposalStoreError { .. }
            | OrchestratorError::PublishError { .. }
            | OrchestratorError::TaskTimeout { .. }
            | OrchestratorError::Cancelled { .. }
            | OrchestratorError::IoError(_) => ErrorKind::Transient,
            OrchestratorError::MalformedEvent(_) | OrchestratorError::JsonError(_) => ErrorKind::MalformedInput,
            OrchestratorError::AdmissionDenied { .. } => ErrorKind::Saturation,
            OrchestratorError::ScoringError { .. } | OrchestratorError::DeliveryError { .. } => {
                ErrorKind::PartialDelivery
            }
            OrchestratorError::ConfigurationError { .. } => ErrorKind::Configuration,
            OrchestratorError::ProposalNotFound { .. } | OrchestratorError::EncodeError { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

/// Decode failures are the sender's fault; encode failures are ours
impl From<SharedError> for OrchestratorError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::SerializationError { message } => OrchestratorError::EncodeError { message },
            other => OrchestratorError::MalformedEvent(other),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
