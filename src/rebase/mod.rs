//! Replays the stack onto a new base.
//!
//! Two strategies with the same contract:
//!
//! - [`RebaseStrategy::InMemory`] computes every replayed tree with
//!   `git merge-tree` and writes commits with `git commit-tree`, touching the
//!   working tree only once at the end. A conflict leaves nothing behind.
//! - [`RebaseStrategy::IncrementalDisk`] cherry-picks one commit at a time on
//!   disk. A conflict leaves the cherry-pick in progress for the user to
//!   resolve, after which [`incremental::resume`] finishes the replay.
//!
//! Clean replays produce identical trees whichever strategy runs.

pub mod in_memory;
pub mod incremental;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::git::{GitResult, rev_parse};
use crate::process::ProcessRunner;
use crate::types::{CommitMetadata, CommitRange, Sha};

/// How the stack is replayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebaseStrategy {
    #[default]
    InMemory,
    IncrementalDisk,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rebase strategy {0:?} (expected in-memory or incremental-disk)")]
pub struct UnknownStrategy(pub String);

impl FromStr for RebaseStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-memory" | "git-revise" => Ok(RebaseStrategy::InMemory),
            "incremental-disk" | "cherry-pick" => Ok(RebaseStrategy::IncrementalDisk),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for RebaseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RebaseStrategy::InMemory => "in-memory",
            RebaseStrategy::IncrementalDisk => "incremental-disk",
        })
    }
}

/// Knobs shared by both strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Run commit hooks where the strategy creates commits through porcelain.
    pub verify: bool,
    /// Replacement messages, keyed by the original commit.
    pub rewrites: HashMap<Sha, String>,
}

impl ReplayOptions {
    pub fn new(verify: bool) -> Self {
        ReplayOptions {
            verify,
            rewrites: HashMap::new(),
        }
    }

    pub fn with_rewrites(mut self, rewrites: HashMap<Sha, String>) -> Self {
        self.rewrites = rewrites;
        self
    }

    /// The message `commit` should carry after the replay.
    pub fn message_for<'a>(&'a self, commit: &'a CommitMetadata) -> &'a str {
        self.rewrites
            .get(&commit.sha)
            .map(String::as_str)
            .unwrap_or(&commit.message)
    }
}

/// Where a replay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Position of the conflicting commit in the range.
    pub index: usize,
    pub sha: Sha,
    /// What git reported.
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    Clean,
    Conflict(Conflict),
    /// Already on the new base with nothing to rewrite.
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub status: ReconcileStatus,
    /// New commit ids, oldest first, for the commits replayed so far.
    pub updated_range: Vec<Sha>,
}

impl ReconcileOutcome {
    pub fn conflict(&self) -> Option<&Conflict> {
        match &self.status {
            ReconcileStatus::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// Replays `range` onto `new_base` with `strategy`.
#[instrument(skip(runner, range, options), fields(commits = range.len(), new_base = %new_base.short()))]
pub async fn reconcile<R: ProcessRunner>(
    runner: &R,
    range: &CommitRange,
    new_base: &Sha,
    strategy: RebaseStrategy,
    options: &ReplayOptions,
) -> GitResult<ReconcileOutcome> {
    if options.rewrites.is_empty() && current_base(runner, range).await? == *new_base {
        info!("stack already on base");
        return Ok(ReconcileOutcome {
            status: ReconcileStatus::Noop,
            updated_range: range.shas().cloned().collect(),
        });
    }

    info!(%strategy, "replaying stack");
    match strategy {
        RebaseStrategy::InMemory => in_memory::replay(runner, range, new_base, options).await,
        RebaseStrategy::IncrementalDisk => incremental::replay(runner, range, new_base, options).await,
    }
}

/// The commit the range currently sits on: the first commit's parent, or `HEAD` when empty.
async fn current_base<R: ProcessRunner>(runner: &R, range: &CommitRange) -> GitResult<Sha> {
    match range.commits().first() {
        Some(first) => parent_of(runner, &first.sha).await,
        None => rev_parse(runner, "HEAD").await,
    }
}

pub(crate) async fn parent_of<R: ProcessRunner>(runner: &R, sha: &Sha) -> GitResult<Sha> {
    rev_parse(runner, &format!("{sha}^")).await
}
