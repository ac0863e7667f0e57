//! Pushing layers and keeping their review requests in step.

use tracing::{info, instrument};

use crate::annotation::{self, WriteArgs};
use crate::error::WorkflowError;
use crate::git;
use crate::github::ReviewGateway;
use crate::process::ProcessRunner;
use crate::store::{OutputEntry, Store};

/// Pushes every layer, opens or retargets its review request, then rewrites
/// each description's stack block.
///
/// Layer `n` targets layer `n - 1`; the first layer targets the base branch.
#[instrument(skip_all)]
pub async fn sync_layers<R: ProcessRunner>(
    runner: &R,
    gateway: &ReviewGateway<R>,
    store: &Store,
    verify: bool,
) -> Result<(), WorkflowError> {
    let commit_map = store.commit_map()?;
    let mut base = store.master_branch()?;
    let mut layers: Vec<(String, String)> = Vec::with_capacity(commit_map.len());

    for group in commit_map.values() {
        let Some(tip) = group.tip() else {
            continue;
        };
        git::push_layer(runner, tip, &group.branch, verify).await?;

        let review = match gateway.status(&group.branch).await? {
            Some(pr) if pr.state.is_open() && pr.base_branch == base => Some(pr),
            Some(pr) if pr.state.is_open() => {
                info!(branch = %group.branch, from = %pr.base_branch, to = %base, "retargeting");
                gateway.set_base(&group.branch, &base).await?
            }
            _ => {
                info!(branch = %group.branch, %base, "opening review request");
                gateway.create(&group.branch, &base).await?
            }
        };
        let review = review.ok_or_else(|| WorkflowError::ReviewNotFound(group.branch.clone()))?;

        store.output(OutputEntry::success(format!("✅ {} {}", group.branch, review.url)));
        layers.push((group.branch.clone(), review.url));
        base = group.branch.clone();
    }

    let urls: Vec<String> = layers.iter().map(|(_, url)| url.clone()).collect();
    for (branch, url) in &layers {
        let body = gateway.body(branch).await?;
        let updated = annotation::write(WriteArgs {
            body: &body,
            active_urls: &urls,
            selected_url: url,
        });
        if updated == body.trim_end() {
            store.debug(format!("description unchanged for {branch}"));
            continue;
        }
        gateway.set_body(branch, &updated).await?;
    }

    Ok(())
}
