//! Pushing layer branches.
//!
//! Layers are pushed straight from a commit with `<sha>:refs/heads/<branch>`,
//! so no local branch is created or checked out for them.

use tracing::info;

use crate::process::{ProcessRunner, RunOptions, quote};
use crate::types::Sha;

use super::GitResult;

/// Force-pushes `sha` to `branch` on `origin`.
///
/// Pre-push hooks are skipped unless `verify` is set.
pub async fn push_layer<R: ProcessRunner>(
    runner: &R,
    sha: &Sha,
    branch: &str,
    verify: bool,
) -> GitResult<()> {
    let refspec = format!("{sha}:refs/heads/{branch}");
    let no_verify = if verify { "" } else { " --no-verify" };
    let command = format!("git push --force{no_verify} origin {}", quote(&refspec)?);

    info!(branch, sha = %sha.short(), "pushing layer");
    runner.run(&command, RunOptions::default()).await?;
    Ok(())
}
