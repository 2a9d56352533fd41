//! Error types for the pipeline

use std::time::Duration;
use thiserror::Error;

/// Failure of one extraction or verification call
///
/// Always scoped to a single chunk or candidate; never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Transport or provider failure
    #[error("Collaborator call failed: {0}")]
    Call(String),

    /// No answer within the configured bound
    #[error("Collaborator timed out after {0:?}")]
    Timeout(Duration),

    /// Output could not be parsed into statements or a verdict
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The run was cancelled while the call was in flight
    #[error("Collaborator call cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(e: serde_json::Error) -> Self {
        CollaboratorError::MalformedResponse(e.to_string())
    }
}

/// Errors that can occur while running the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Repository unreachable or unwritable; aborts the current run
    #[error("Storage error: {0}")]
    Storage(String),

    /// Extraction or verification call failed
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// A spawned extraction task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),
}

impl PipelineError {
    /// Wrap a repository error
    pub fn storage(e: impl std::fmt::Display) -> Self {
        PipelineError::Storage(e.to_string())
    }

    /// Whether this error ends the whole document run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Storage(_) | PipelineError::Config(_) | PipelineError::Task(_)
        )
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::Task(e.to_string())
    }
}
