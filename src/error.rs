//! Crate-level error types.
//!
//! Each module owns its own error enum; [`WorkflowError`] is the union the
//! workflow driver propagates. A rebase conflict is not an error: it is a
//! normal reconcile outcome (see [`crate::rebase::ReconcileStatus`]).

use thiserror::Error;

use crate::git::GitError;
use crate::github::{GatewayError, GithubApiError};
use crate::process::ProcessError;
use crate::workflow::TransitionError;

/// A required identity field was unset when an operation needed it.
///
/// Never defaulted: the operation aborts immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must exist")]
pub struct PreconditionViolation {
    pub field: &'static str,
}

impl PreconditionViolation {
    pub fn new(field: &'static str) -> Self {
        PreconditionViolation { field }
    }
}

/// Requires `value` to be set, naming `field` otherwise.
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, PreconditionViolation> {
    value.ok_or(PreconditionViolation::new(field))
}

/// Errors that end a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A review request was opened but could not be read back.
    #[error("no review request found for {0}")]
    ReviewNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    /// The review-tool failure behind this error, if any.
    pub fn github_api_error(&self) -> Option<&GithubApiError> {
        match self {
            WorkflowError::Gateway(GatewayError::Api(err)) => Some(err),
            _ => None,
        }
    }
}
