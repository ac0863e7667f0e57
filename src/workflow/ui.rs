//! The collaborator that shows output and answers prompts.

use std::collections::HashMap;
use std::future::Future;

use crate::rebase::Conflict;
use crate::store::OutputEntry;
use crate::types::{CommitMap, CommitRange, Sha, with_stack_id};

/// Yes/no gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    LocalMergeRebase,
    SelectCommitRanges,
}

impl Prompt {
    pub fn question(&self) -> &'static str {
        match self {
            Prompt::LocalMergeRebase => "Rebase the stack onto the latest base branch?",
            Prompt::SelectCommitRanges => "Assign commits to layers now?",
        }
    }
}

/// What the UI needs to offer a commit-range selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectRequest<'a> {
    pub username: &'a str,
    pub commit_range: &'a CommitRange,
    pub commit_map: &'a CommitMap,
}

/// One layer as chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedGroup {
    pub id: String,
    pub commits: Vec<Sha>,
}

/// The user's layer assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
    pub groups: Vec<SelectedGroup>,
    /// Push layers and update review requests after the replay.
    pub sync: bool,
}

impl RangeSelection {
    /// Keeps existing assignments and gives each unassigned commit its own layer.
    pub fn keep_existing(range: &CommitRange, sync: bool) -> Self {
        let mut groups: Vec<SelectedGroup> = Vec::new();
        for commit in range.commits() {
            let id = commit
                .stack_id
                .clone()
                .unwrap_or_else(|| commit.sha.short().to_string());
            match groups.iter_mut().find(|g| g.id == id) {
                Some(group) => group.commits.push(commit.sha.clone()),
                None => groups.push(SelectedGroup {
                    id,
                    commits: vec![commit.sha.clone()],
                }),
            }
        }
        RangeSelection { groups, sync }
    }

    /// The stack id chosen for `sha`.
    pub fn id_for(&self, sha: &Sha) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.commits.contains(sha))
            .map(|g| g.id.as_str())
    }

    /// New messages for the commits whose stack id changes.
    pub fn rewrites(&self, range: &CommitRange) -> HashMap<Sha, String> {
        range
            .commits()
            .iter()
            .filter_map(|commit| {
                let id = self.id_for(&commit.sha)?;
                (commit.stack_id.as_deref() != Some(id))
                    .then(|| (commit.sha.clone(), with_stack_id(&commit.message, id)))
            })
            .collect()
    }
}

/// The user's answer once a conflict has been looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualResolution {
    /// Conflicts are resolved and staged; carry on.
    Continue,
    /// Give up and restore the original head.
    Abort,
}

/// Renders output and answers prompts.
pub trait Ui {
    /// Shows newly appended output entries.
    fn render(&self, entries: &[OutputEntry]) -> impl Future<Output = ()>;

    fn confirm(&self, prompt: Prompt) -> impl Future<Output = bool>;

    /// `None` cancels.
    fn select_commit_ranges(
        &self,
        request: SelectRequest<'_>,
    ) -> impl Future<Output = Option<RangeSelection>>;

    /// Waits while the user resolves `conflict` on disk.
    fn await_manual_resolution(&self, conflict: &Conflict) -> impl Future<Output = ManualResolution>;

    fn clear(&self) -> impl Future<Output = ()>;

    fn unmount(&self) -> impl Future<Output = ()>;
}
