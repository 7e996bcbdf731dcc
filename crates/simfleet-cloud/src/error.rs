//! Cloud provider error types

use crate::settings::CloudKind;
use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Session kind {session} does not match settings kind {settings}")]
    KindMismatch {
        settings: CloudKind,
        session: CloudKind,
    },

    #[error("Provider has no session after start")]
    MissingSession,

    #[error("Start request for {0} was not accepted")]
    StartRejected(String),

    #[error("Terminate request was not accepted")]
    TerminateRejected,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Worker task failed: {0}")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Programming or configuration defects that must abort the operation
    /// instead of being absorbed as a best-effort failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CloudError::KindMismatch { .. }
                | CloudError::MissingSession
                | CloudError::WorkerPanicked(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
