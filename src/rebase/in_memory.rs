//! Replay without touching the working tree until the end.

use tracing::{debug, warn};

use crate::git::GitResult;
use crate::process::{ProcessError, ProcessRunner, RunOptions, quote};
use crate::types::{CommitMetadata, CommitRange, Sha};

use super::{Conflict, ReconcileOutcome, ReconcileStatus, ReplayOptions, parent_of};

/// `git merge-tree` exit code for a conflicted merge.
const MERGE_TREE_CONFLICT: i32 = 1;

enum Merge {
    Tree(String),
    Conflict(String),
}

/// Replays `range` onto `new_base`, then moves the current branch to the result.
///
/// On conflict nothing has changed on disk and the branch still points at the
/// original head.
pub async fn replay<R: ProcessRunner>(
    runner: &R,
    range: &CommitRange,
    new_base: &Sha,
    options: &ReplayOptions,
) -> GitResult<ReconcileOutcome> {
    let mut tip = new_base.clone();
    let mut updated = Vec::with_capacity(range.len());

    for (index, commit) in range.commits().iter().enumerate() {
        let parent = parent_of(runner, &commit.sha).await?;

        let tree = match merge_tree(runner, &parent, &tip, &commit.sha).await? {
            Merge::Tree(tree) => tree,
            Merge::Conflict(output) => {
                warn!(index, sha = %commit.sha.short(), "conflict replaying commit in memory");
                return Ok(ReconcileOutcome {
                    status: ReconcileStatus::Conflict(Conflict {
                        index,
                        sha: commit.sha.clone(),
                        output,
                    }),
                    updated_range: updated,
                });
            }
        };

        tip = commit_tree(runner, commit, &tree, &tip, options.message_for(commit)).await?;
        debug!(from = %commit.sha.short(), to = %tip.short(), "replayed");
        updated.push(tip.clone());
    }

    let command = format!("git reset --keep {tip}");
    runner.run(&command, RunOptions::default()).await?;

    Ok(ReconcileOutcome {
        status: ReconcileStatus::Clean,
        updated_range: updated,
    })
}

/// Three-way merge of `commit` onto `tip` using the commit's own parent as base.
async fn merge_tree<R: ProcessRunner>(
    runner: &R,
    parent: &Sha,
    tip: &Sha,
    commit: &Sha,
) -> GitResult<Merge> {
    let command = format!("git merge-tree --write-tree --merge-base={parent} {tip} {commit}");
    let out = runner.run(&command, RunOptions::ignore_exit_code()).await?;

    match out.exit_code {
        0 => {
            let tree = out.stdout.lines().next().unwrap_or_default().trim().to_string();
            Ok(Merge::Tree(tree))
        }
        MERGE_TREE_CONFLICT => Ok(Merge::Conflict(out.output)),
        code => Err(ProcessError::NonZeroExit {
            command,
            code,
            output: out.output,
        }
        .into()),
    }
}

/// Writes a commit for `tree` on top of `parent`, keeping the original author.
async fn commit_tree<R: ProcessRunner>(
    runner: &R,
    original: &CommitMetadata,
    tree: &str,
    parent: &Sha,
    message: &str,
) -> GitResult<Sha> {
    let command = format!(
        "GIT_AUTHOR_NAME={} GIT_AUTHOR_EMAIL={} GIT_AUTHOR_DATE={} git commit-tree {} -p {} -m {}",
        quote(&original.author_name)?,
        quote(&original.author_email)?,
        quote(&original.author_date)?,
        quote(tree)?,
        parent,
        quote(message)?
    );
    let out = runner.run(&command, RunOptions::default()).await?;
    Ok(Sha::parse(out.stdout)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebase::{RebaseStrategy, reconcile};
    use crate::test_utils::MockRunner;

    fn commit(c: char) -> CommitMetadata {
        CommitMetadata {
            sha: Sha::new(c.to_string().repeat(40)),
            subject: format!("commit {c}"),
            message: format!("commit {c}"),
            author_name: "magus".to_string(),
            author_email: "magus@example.com".to_string(),
            author_date: "2024-01-01T00:00:00+00:00".to_string(),
            stack_id: None,
        }
    }

    #[tokio::test]
    async fn conflict_reports_index_and_leaves_disk_untouched() {
        let runner = MockRunner::new();
        let old_base = "0".repeat(40);
        let new_base = Sha::new("1".repeat(40));
        runner
            .respond("git rev-parse", &old_base)
            .respond_once("git merge-tree", "tree-a")
            .fail("git merge-tree", 1, "CONFLICT (content): Merge conflict in a.txt")
            .respond("GIT_AUTHOR_NAME", &"c".repeat(40));

        let range = CommitRange::new(vec![commit('a'), commit('b')]);
        let outcome = reconcile(
            &runner,
            &range,
            &new_base,
            RebaseStrategy::InMemory,
            &ReplayOptions::new(true),
        )
        .await
        .unwrap();

        let conflict = outcome.conflict().unwrap();
        assert_eq!(conflict.index, 1);
        assert_eq!(conflict.sha, range.commits()[1].sha);
        assert!(conflict.output.contains("Merge conflict in a.txt"));
        assert_eq!(outcome.updated_range, vec![Sha::new("c".repeat(40))]);
        assert!(!runner.called("git reset"));
    }

    #[tokio::test]
    async fn merge_tree_failure_other_than_conflict_is_an_error() {
        let runner = MockRunner::new();
        runner
            .respond("git rev-parse", &"0".repeat(40))
            .fail("git merge-tree", 128, "fatal: unknown option");

        let range = CommitRange::new(vec![commit('a')]);
        let result = replay(
            &runner,
            &range,
            &Sha::new("1".repeat(40)),
            &ReplayOptions::new(true),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn clean_replay_preserves_author_and_resets_branch() {
        let runner = MockRunner::new();
        let new_tip = "d".repeat(40);
        runner
            .respond("git rev-parse", &"0".repeat(40))
            .respond("git merge-tree", "tree-a")
            .respond("GIT_AUTHOR_NAME", &new_tip);

        let range = CommitRange::new(vec![commit('a')]);
        let outcome = replay(
            &runner,
            &range,
            &Sha::new("1".repeat(40)),
            &ReplayOptions::new(true),
        )
        .await
        .unwrap();

        assert_eq!(outcome.status, ReconcileStatus::Clean);
        assert_eq!(outcome.updated_range, vec![Sha::new(new_tip.clone())]);

        let calls = runner.calls();
        let commit_tree = calls.iter().find(|c| c.contains("git commit-tree")).unwrap();
        assert!(commit_tree.starts_with("GIT_AUTHOR_NAME=magus "));
        assert!(commit_tree.contains("GIT_AUTHOR_EMAIL="));
        assert!(commit_tree.contains("magus@example.com"));
        assert_eq!(calls.last().unwrap(), &format!("git reset --keep {new_tip}"));
    }
}
