//! Review-request gateway over the GitHub CLI.
//!
//! All review-tool access goes through `gh`, so authentication and host
//! configuration are whatever the user's `gh` already has. Results are cached
//! per head branch in the workflow store.

mod error;
mod gateway;

pub use error::{GatewayError, GithubApiError};
pub use gateway::ReviewGateway;
