//! Replay on disk, one cherry-pick at a time.
//!
//! A conflicting cherry-pick is left in progress so the user can resolve it
//! with ordinary git tools. [`resume`] picks up from there; [`abort`] puts
//! the branch back where it was.

use tracing::{debug, info, warn};

use crate::git::{GitResult, rev_parse};
use crate::process::{ProcessError, ProcessRunner, RunOptions, quote};
use crate::types::{CommitMetadata, CommitRange, Sha};

use super::{Conflict, ReconcileOutcome, ReconcileStatus, ReplayOptions};

/// Hard-resets to `new_base` and cherry-picks `range` onto it.
pub async fn replay<R: ProcessRunner>(
    runner: &R,
    range: &CommitRange,
    new_base: &Sha,
    options: &ReplayOptions,
) -> GitResult<ReconcileOutcome> {
    let command = format!("git reset --hard {new_base}");
    runner.run(&command, RunOptions::default()).await?;
    pick_from(runner, range, 0, options, Vec::new()).await
}

/// Continues a replay stopped at `conflict`.
///
/// If the conflict is still unresolved the outcome is a conflict again, with
/// git's latest output.
pub async fn resume<R: ProcessRunner>(
    runner: &R,
    range: &CommitRange,
    conflict: &Conflict,
    options: &ReplayOptions,
) -> GitResult<ReconcileOutcome> {
    if cherry_pick_in_progress(runner).await? {
        let out = runner
            .run(
                "git -c core.editor=true cherry-pick --continue",
                RunOptions::ignore_exit_code(),
            )
            .await?;
        if !out.success() {
            warn!(sha = %conflict.sha.short(), "conflict still unresolved");
            return Ok(ReconcileOutcome {
                status: ReconcileStatus::Conflict(Conflict {
                    output: out.output,
                    ..conflict.clone()
                }),
                updated_range: Vec::new(),
            });
        }
    }

    let mut updated = Vec::new();
    if let Some(commit) = range.commits().get(conflict.index) {
        amend_if_rewritten(runner, commit, options).await?;
        updated.push(rev_parse(runner, "HEAD").await?);
    }

    info!(remaining = range.len().saturating_sub(conflict.index + 1), "resuming replay");
    pick_from(runner, range, conflict.index + 1, options, updated).await
}

/// Abandons an on-disk replay and restores `original_head`.
pub async fn abort<R: ProcessRunner>(runner: &R, original_head: &Sha) -> GitResult<()> {
    info!(head = %original_head.short(), "aborting replay");
    runner
        .run("git cherry-pick --abort", RunOptions::ignore_exit_code())
        .await?;
    let command = format!("git reset --hard {original_head}");
    runner.run(&command, RunOptions::default()).await?;
    Ok(())
}

async fn pick_from<R: ProcessRunner>(
    runner: &R,
    range: &CommitRange,
    start: usize,
    options: &ReplayOptions,
    mut updated: Vec<Sha>,
) -> GitResult<ReconcileOutcome> {
    for (index, commit) in range.commits().iter().enumerate().skip(start) {
        let command = format!(
            "git cherry-pick --allow-empty --keep-redundant-commits {}",
            commit.sha
        );
        let out = runner.run(&command, RunOptions::ignore_exit_code()).await?;

        if !out.success() {
            if cherry_pick_in_progress(runner).await? {
                warn!(index, sha = %commit.sha.short(), "conflict replaying commit on disk");
                return Ok(ReconcileOutcome {
                    status: ReconcileStatus::Conflict(Conflict {
                        index,
                        sha: commit.sha.clone(),
                        output: out.output,
                    }),
                    updated_range: updated,
                });
            }
            return Err(ProcessError::NonZeroExit {
                command,
                code: out.exit_code,
                output: out.output,
            }
            .into());
        }

        amend_if_rewritten(runner, commit, options).await?;
        let head = rev_parse(runner, "HEAD").await?;
        debug!(from = %commit.sha.short(), to = %head.short(), "replayed");
        updated.push(head);
    }

    Ok(ReconcileOutcome {
        status: ReconcileStatus::Clean,
        updated_range: updated,
    })
}

async fn amend_if_rewritten<R: ProcessRunner>(
    runner: &R,
    commit: &CommitMetadata,
    options: &ReplayOptions,
) -> GitResult<()> {
    let Some(message) = options.rewrites.get(&commit.sha) else {
        return Ok(());
    };
    let no_verify = if options.verify { "" } else { " --no-verify" };
    let command = format!(
        "git commit --amend --allow-empty{no_verify} -m {}",
        quote(message)?
    );
    runner.run(&command, RunOptions::default()).await?;
    Ok(())
}

async fn cherry_pick_in_progress<R: ProcessRunner>(runner: &R) -> GitResult<bool> {
    let out = runner
        .run(
            "git rev-parse -q --verify CHERRY_PICK_HEAD",
            RunOptions::ignore_exit_code(),
        )
        .await?;
    Ok(out.success())
}
