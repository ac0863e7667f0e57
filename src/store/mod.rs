//! The single owner of workflow state.
//!
//! [`Store`] is a cheap cloneable handle; every component that needs state
//! holds one. Writes go through [`Store::dispatch`], reads through snapshots
//! or the selector methods. The lock is only held for one synchronous reduce
//! or read, never across an await.

mod action;
mod output;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{PreconditionViolation, require};
use crate::types::{CommitMap, CommitRange, ReviewRequest, Sha};

pub use action::{Action, RepositorySnapshot, reduce};
pub use output::{OutputEntry, OutputKind};

/// Workflow step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    #[default]
    Loading,
    Status,
    PreLocalMergeRebase,
    LocalMergeRebase,
    PreSelectCommitRanges,
    SelectCommitRanges,
    ManualRebase,
    ManualRebaseNoSync,
    PostRebaseStatus,
    GithubApiError,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Loading => "loading",
            Step::Status => "status",
            Step::PreLocalMergeRebase => "pre-local-merge-rebase",
            Step::LocalMergeRebase => "local-merge-rebase",
            Step::PreSelectCommitRanges => "pre-select-commit-ranges",
            Step::SelectCommitRanges => "select-commit-ranges",
            Step::ManualRebase => "manual-rebase",
            Step::ManualRebaseNoSync => "manual-rebase-no-sync",
            Step::PostRebaseStatus => "post-rebase-status",
            Step::GithubApiError => "github-api-error",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the run knows. Identity fields stay `None` until loading resolves them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowState {
    pub step: Step,
    /// `owner/repo` of the working repository.
    pub repo_path: Option<String>,
    pub username: Option<String>,
    pub head: Option<Sha>,
    pub merge_base: Option<Sha>,
    /// Tip of the remote base branch.
    pub upstream_head: Option<Sha>,
    pub branch_name: Option<String>,
    pub master_branch: Option<String>,
    pub commit_range: Option<CommitRange>,
    pub commit_map: Option<CommitMap>,
    pub is_dirty_check_stash: bool,
    /// Head branch to last-known review request.
    pub review_cache: IndexMap<String, ReviewRequest>,
    pub output: Vec<OutputEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    state: Arc<Mutex<WorkflowState>>,
    verbose: bool,
}

impl Store {
    pub fn new(verbose: bool) -> Self {
        Store {
            state: Arc::default(),
            verbose,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dispatch(&self, action: Action) {
        if let Action::SetStep(step) = &action {
            debug!(step = %step, "set step");
        }
        reduce(&mut self.lock(), action);
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.lock().clone()
    }

    /// Reads a projection of the state without cloning all of it.
    pub fn select<T>(&self, f: impl FnOnce(&WorkflowState) -> T) -> T {
        f(&self.lock())
    }

    pub fn step(&self) -> Step {
        self.select(|s| s.step)
    }

    pub fn username(&self) -> Result<String, PreconditionViolation> {
        require(self.select(|s| s.username.clone()), "username")
    }

    pub fn repo_path(&self) -> Result<String, PreconditionViolation> {
        require(self.select(|s| s.repo_path.clone()), "repo_path")
    }

    pub fn master_branch(&self) -> Result<String, PreconditionViolation> {
        require(self.select(|s| s.master_branch.clone()), "master_branch")
    }

    pub fn merge_base(&self) -> Result<Sha, PreconditionViolation> {
        require(self.select(|s| s.merge_base.clone()), "merge_base")
    }

    pub fn upstream_head(&self) -> Result<Sha, PreconditionViolation> {
        require(self.select(|s| s.upstream_head.clone()), "upstream_head")
    }

    pub fn head(&self) -> Result<Sha, PreconditionViolation> {
        require(self.select(|s| s.head.clone()), "head")
    }

    pub fn commit_range(&self) -> Result<CommitRange, PreconditionViolation> {
        require(self.select(|s| s.commit_range.clone()), "commit_range")
    }

    pub fn commit_map(&self) -> Result<CommitMap, PreconditionViolation> {
        require(self.select(|s| s.commit_map.clone()), "commit_map")
    }

    pub fn cached_review(&self, branch: &str) -> Option<ReviewRequest> {
        self.select(|s| s.review_cache.get(branch).cloned())
    }

    pub fn is_dirty_check_stash(&self) -> bool {
        self.select(|s| s.is_dirty_check_stash)
    }

    pub fn output_len(&self) -> usize {
        self.select(|s| s.output.len())
    }

    /// Output entries appended since `from`.
    pub fn output_since(&self, from: usize) -> Vec<OutputEntry> {
        self.select(|s| s.output.get(from..).map(<[_]>::to_vec).unwrap_or_default())
    }

    pub fn output(&self, entry: OutputEntry) {
        self.dispatch(Action::Output(entry));
    }

    /// Appends a debug entry; dropped unless the run is verbose.
    pub fn debug(&self, text: impl Into<String>) {
        let text = text.into();
        debug!("{text}");
        if self.verbose {
            self.output(OutputEntry::debug(text));
        }
    }

    /// Writes the current state as pretty JSON to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let store = Store::new(false);
        let other = store.clone();
        other.dispatch(Action::SetStep(Step::Status));
        assert_eq!(store.step(), Step::Status);
    }

    #[test]
    fn missing_identity_is_a_precondition_violation() {
        let store = Store::new(false);
        assert_eq!(store.username().unwrap_err().field, "username");
        assert_eq!(store.repo_path().unwrap_err().to_string(), "repo_path must exist");

        store.dispatch(Action::Identity {
            username: "magus".to_string(),
            repo_path: "magus/git-stack".to_string(),
        });
        assert_eq!(store.username().unwrap(), "magus");
    }

    #[test]
    fn debug_entries_only_recorded_when_verbose() {
        let quiet = Store::new(false);
        quiet.debug("MISS");
        assert_eq!(quiet.output_len(), 0);

        let verbose = Store::new(true);
        verbose.debug("MISS");
        assert_eq!(verbose.output_since(0), vec![OutputEntry::debug("MISS")]);
        assert!(verbose.output_since(5).is_empty());
    }

    #[test]
    fn step_serializes_kebab_case() {
        let json = serde_json::to_string(&Step::ManualRebaseNoSync).unwrap();
        assert_eq!(json, "\"manual-rebase-no-sync\"");
        assert_eq!(Step::PreSelectCommitRanges.to_string(), "pre-select-commit-ranges");
    }

    #[test]
    fn state_dump_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = Store::new(false);
        store.dispatch(Action::DirtyCheckStashed);
        store.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["step"], "loading");
        assert_eq!(value["is_dirty_check_stash"], true);
    }
}
