//! Local git queries and the dirty-check stash.
//!
//! Everything shells out through a [`ProcessRunner`] so the workflow can be
//! driven against a scripted runner in tests. Arguments are quoted with
//! [`quote`] before interpolation.

pub mod push;


use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::process::{ProcessError, ProcessRunner, RunOptions, quote};
use crate::store::RepositorySnapshot;
use crate::types::{
    CommitParseError, CommitRange, InvalidSha, Sha, build_commit_map, commit::GIT_LOG_FORMAT,
};

pub use push::push_layer;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Command(#[from] ProcessError),

    #[error("invalid SHA: {0}")]
    InvalidSha(#[from] InvalidSha),

    #[error("unreadable git log: {0}")]
    Log(#[from] CommitParseError),

    /// `HEAD` is not on a branch.
    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Inputs for resolving the repository state.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions<'a> {
    pub username: &'a str,
    pub master_branch: &'a str,
    /// Give unassigned commits a synthetic stack id.
    pub mock_metadata: bool,
}

async fn git_stdout<R: ProcessRunner>(runner: &R, command: &str) -> GitResult<String> {
    Ok(runner.run(command, RunOptions::default()).await?.stdout)
}

/// Whether the working tree has uncommitted or untracked changes.
pub async fn is_dirty<R: ProcessRunner>(runner: &R) -> GitResult<bool> {
    Ok(!git_stdout(runner, "git status --porcelain").await?.trim().is_empty())
}

/// Stashes all local changes, untracked files included.
pub async fn stash<R: ProcessRunner>(runner: &R) -> GitResult<()> {
    info!("stashing local changes");
    runner
        .run("git stash --include-untracked", RunOptions::default())
        .await?;
    Ok(())
}

/// Restores the most recent stash.
pub async fn stash_pop<R: ProcessRunner>(runner: &R) -> GitResult<()> {
    runner.run("git stash pop", RunOptions::default()).await?;
    Ok(())
}

/// Oldest git whose `merge-tree` accepts `--merge-base`.
pub const MERGE_TREE_MIN_VERSION: (u32, u32) = (2, 40);

/// Major and minor version from `git version` output, e.g.
/// `git version 2.39.3 (Apple Git-146)`.
pub fn parse_version(output: &str) -> Option<(u32, u32)> {
    let version = output.trim().strip_prefix("git version ")?;
    let mut parts = version.split(['.', ' ']);
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// The installed git's version, `None` when the output is unrecognised.
pub async fn version<R: ProcessRunner>(runner: &R) -> GitResult<Option<(u32, u32)>> {
    let version = parse_version(&git_stdout(runner, "git version").await?);
    debug!(?version, "git version");
    Ok(version)
}

pub async fn current_branch<R: ProcessRunner>(runner: &R) -> GitResult<String> {
    let branch = git_stdout(runner, "git branch --show-current").await?;
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(GitError::DetachedHead);
    }
    Ok(branch.to_string())
}

/// `master` when `origin/master` exists, `main` otherwise.
pub async fn detect_master_branch<R: ProcessRunner>(runner: &R) -> GitResult<String> {
    let out = runner
        .run(
            "git show-ref --verify --quiet refs/remotes/origin/master",
            RunOptions::ignore_exit_code(),
        )
        .await?;
    let branch = if out.success() { "master" } else { "main" };
    debug!(branch, "detected base branch");
    Ok(branch.to_string())
}

pub async fn fetch_branch<R: ProcessRunner>(runner: &R, branch: &str) -> GitResult<()> {
    let command = format!("git fetch --no-tags origin {}", quote(branch)?);
    runner.run(&command, RunOptions::default()).await?;
    Ok(())
}

pub async fn rev_parse<R: ProcessRunner>(runner: &R, rev: &str) -> GitResult<Sha> {
    let command = format!("git rev-parse {}", quote(rev)?);
    Ok(Sha::parse(git_stdout(runner, &command).await?)?)
}

pub async fn merge_base<R: ProcessRunner>(runner: &R, a: &str, b: &str) -> GitResult<Sha> {
    let command = format!("git merge-base {} {}", quote(a)?, quote(b)?);
    Ok(Sha::parse(git_stdout(runner, &command).await?)?)
}

/// Commits in `base..head`, oldest first.
pub async fn commit_range<R: ProcessRunner>(runner: &R, base: &Sha, head: &Sha) -> GitResult<CommitRange> {
    let command = format!(
        "git log --reverse {} {}..{}",
        quote(&format!("--format={GIT_LOG_FORMAT}"))?,
        base,
        head
    );
    Ok(CommitRange::from_git_log(&git_stdout(runner, &command).await?)?)
}

/// Resolves branch, head, merge base, upstream head and the commit layers.
///
/// Expects the base branch to have been fetched already.
#[instrument(skip(runner))]
pub async fn resolve<R: ProcessRunner>(
    runner: &R,
    options: ResolveOptions<'_>,
) -> GitResult<RepositorySnapshot> {
    let branch_name = current_branch(runner).await?;
    let upstream = format!("origin/{}", options.master_branch);

    let head = rev_parse(runner, "HEAD").await?;
    let merge_base = merge_base(runner, "HEAD", &upstream).await?;
    let upstream_head = rev_parse(runner, &upstream).await?;

    let mut range = commit_range(runner, &merge_base, &head).await?;
    if options.mock_metadata {
        range = range.with_mock_metadata();
    }
    let commit_map = build_commit_map(&range, options.username);

    info!(
        branch = %branch_name,
        head = %head.short(),
        merge_base = %merge_base.short(),
        commits = range.len(),
        layers = commit_map.len(),
        "resolved repository"
    );

    Ok(RepositorySnapshot {
        branch_name,
        master_branch: options.master_branch.to_string(),
        head,
        merge_base,
        upstream_head,
        commit_range: range,
        commit_map,
    })
}
