//! Per-layer status and the status table.

use crate::error::WorkflowError;
use crate::github::ReviewGateway;
use crate::process::ProcessRunner;
use crate::store::{OutputEntry, Store};
use crate::types::{CommitGroup, ReviewRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// No review request for the layer branch.
    Missing,
    Closed,
    /// The review request's commits differ from the local layer.
    Outdated,
    /// The review request targets the wrong base.
    Retarget,
    Synced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStatus {
    pub group: CommitGroup,
    /// Branch the layer's review request should target.
    pub base: String,
    pub review: Option<ReviewRequest>,
    pub state: LayerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    pub branch_name: String,
    pub master_branch: String,
    /// The remote base branch has commits the stack is not based on.
    pub drift: bool,
    pub unassigned: usize,
    pub layers: Vec<LayerStatus>,
}

pub fn layer_state(group: &CommitGroup, base: &str, review: Option<&ReviewRequest>) -> LayerState {
    let Some(pr) = review else {
        return LayerState::Missing;
    };
    if !pr.state.is_open() {
        LayerState::Closed
    } else if !pr.commit_shas().eq(group.commits.iter()) {
        LayerState::Outdated
    } else if pr.base_branch != base {
        LayerState::Retarget
    } else {
        LayerState::Synced
    }
}

impl StackStatus {
    /// Whether any layer needs reassignment, pushing or a review request update.
    pub fn is_stale(&self) -> bool {
        self.unassigned > 0 || self.layers.iter().any(|l| l.state != LayerState::Synced)
    }

    pub fn render(&self) -> Vec<OutputEntry> {
        let upstream = format!("origin/{}", self.master_branch);
        let mut entries = vec![OutputEntry::text(format!("{} → {}", self.branch_name, upstream))];

        if self.drift {
            entries.push(OutputEntry::warning(format!("{upstream} has new commits")));
        }

        if self.layers.is_empty() && self.unassigned == 0 {
            entries.push(OutputEntry::text(format!("No commits on top of {upstream}")));
        }

        for layer in &self.layers {
            let branch = &layer.group.branch;
            let line = match (&layer.review, layer.state) {
                (None, _) => format!("⏳ {branch} no pull request"),
                (Some(pr), LayerState::Closed) => format!("⏳ {branch} {} closed", pr.number),
                (Some(pr), LayerState::Outdated) => format!("🔄 {branch} {} needs push", pr.number),
                (Some(pr), LayerState::Retarget) => format!(
                    "🔄 {branch} {} base {} → {}",
                    pr.number, pr.base_branch, layer.base
                ),
                (Some(pr), _) => format!("✅ {branch} {} {}", pr.number, pr.url),
            };
            entries.push(OutputEntry::text(line));
        }

        if self.unassigned > 0 {
            let noun = if self.unassigned == 1 { "commit" } else { "commits" };
            entries.push(OutputEntry::warning(format!(
                "{} {noun} without a stack id",
                self.unassigned
            )));
        }

        entries
    }
}

/// Looks up every layer's review request and classifies it.
pub async fn evaluate<R: ProcessRunner>(
    gateway: &ReviewGateway<R>,
    store: &Store,
) -> Result<StackStatus, WorkflowError> {
    let snapshot = store.snapshot();
    let master_branch = store.master_branch()?;
    let commit_map = store.commit_map()?;
    let range = store.commit_range()?;

    let mut layers = Vec::with_capacity(commit_map.len());
    let mut base = master_branch.clone();
    for group in commit_map.values() {
        let review = gateway.status(&group.branch).await?;
        let state = layer_state(group, &base, review.as_ref());
        layers.push(LayerStatus {
            group: group.clone(),
            base: std::mem::replace(&mut base, group.branch.clone()),
            review,
            state,
        });
    }

    Ok(StackStatus {
        branch_name: snapshot.branch_name.unwrap_or_default(),
        drift: snapshot.upstream_head != snapshot.merge_base,
        master_branch,
        unassigned: range.unassigned().count(),
        layers,
    })
}
