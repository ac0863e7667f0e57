//! Review-tool error types.
//!
//! The gateway never retries. A non-zero exit from `gh` is reported once as
//! [`GithubApiError`], carrying the command line and everything it printed so
//! the user can see what the tool said.

use thiserror::Error;

use crate::error::PreconditionViolation;
use crate::process::ProcessError;
use crate::types::InvalidRepoId;

/// A `gh` command exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{command}] ({exit_code})\n{output}")]
pub struct GithubApiError {
    pub command: String,
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

/// Errors from the review-request gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("GitHub API error: {0}")]
    Api(#[from] GithubApiError),

    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// `gh` succeeded but printed something that is not the expected JSON.
    #[error("unexpected response from gh: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] InvalidRepoId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_command_and_output() {
        let err = GithubApiError {
            command: "gh pr list".to_string(),
            exit_code: 4,
            output: "authentication required".to_string(),
        };
        assert_eq!(err.to_string(), "[gh pr list] (4)\nauthentication required");

        let wrapped = GatewayError::from(err);
        assert!(wrapped.to_string().starts_with("GitHub API error: [gh pr list]"));
    }
}
