//! Actions and the reducer that applies them.
//!
//! `reduce` is the only code that mutates [`WorkflowState`]. It is pure with
//! respect to the outside world: every side effect happens before an action
//! is dispatched.

use crate::types::{CommitMap, CommitRange, ReviewRequest, Sha};

use super::output::OutputEntry;
use super::{Step, WorkflowState};

/// Everything the repository queries resolve in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub branch_name: String,
    pub master_branch: String,
    pub head: Sha,
    pub merge_base: Sha,
    pub upstream_head: Sha,
    pub commit_range: CommitRange,
    pub commit_map: CommitMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetStep(Step),

    /// Review-tool login and `owner/repo` of the working repository.
    Identity { username: String, repo_path: String },

    RepositoryResolved(Box<RepositorySnapshot>),

    DirtyCheckStashed,
    StashRestored,

    CacheReviewRequest(Box<ReviewRequest>),
    ResetReviewCache,

    /// A review-tool command failed; the run ends in `github-api-error`.
    GithubApiError { output: String },

    Output(OutputEntry),
}

/// Applies `action` to `state`.
pub fn reduce(state: &mut WorkflowState, action: Action) {
    match action {
        Action::SetStep(step) => {
            state.step = step;
        }

        Action::Identity {
            username,
            repo_path,
        } => {
            state.username = Some(username);
            state.repo_path = Some(repo_path);
        }

        Action::RepositoryResolved(snapshot) => {
            let RepositorySnapshot {
                branch_name,
                master_branch,
                head,
                merge_base,
                upstream_head,
                commit_range,
                commit_map,
            } = *snapshot;
            state.branch_name = Some(branch_name);
            state.master_branch = Some(master_branch);
            state.head = Some(head);
            state.merge_base = Some(merge_base);
            state.upstream_head = Some(upstream_head);
            state.commit_range = Some(commit_range);
            state.commit_map = Some(commit_map);
        }

        Action::DirtyCheckStashed => {
            state.is_dirty_check_stash = true;
        }

        Action::StashRestored => {
            state.is_dirty_check_stash = false;
        }

        Action::CacheReviewRequest(pr) => {
            state.review_cache.insert(pr.head_branch.clone(), *pr);
        }

        Action::ResetReviewCache => {
            state.review_cache.clear();
        }

        Action::GithubApiError { output } => {
            state.step = Step::GithubApiError;
            state.output.push(OutputEntry::error(output));
        }

        Action::Output(entry) => {
            state.output.push(entry);
        }
    }
}
