use std::io::Write as _;

use tracing::{debug, instrument, warn};

use crate::process::{CommandOutput, ProcessRunner, RunOptions, quote};
use crate::store::{Action, Store};
use crate::types::{REVIEW_REQUEST_FIELDS, RepoId, ReviewRequest};

use super::error::{GatewayError, GithubApiError};

const NOT_FOUND: &str = "no pull requests found";

/// Review-request queries and mutations, cached by head branch.
///
/// The cache lives in the store so it shows up in state dumps; it is only
/// cleared by [`ReviewGateway::reset`].
#[derive(Debug, Clone)]
pub struct ReviewGateway<R> {
    runner: R,
    store: Store,
}

impl<R: ProcessRunner> ReviewGateway<R> {
    pub fn new(runner: R, store: Store) -> Self {
        ReviewGateway { runner, store }
    }

    /// Login of the authenticated `gh` user.
    pub async fn viewer_login(&self) -> Result<String, GatewayError> {
        let out = self.gh("gh api user --jq .login".to_string()).await?;
        Ok(out.stdout.trim().to_string())
    }

    /// The repository in the working directory.
    pub async fn repository(&self) -> Result<RepoId, GatewayError> {
        let out = self
            .gh("gh repo view --json nameWithOwner --jq .nameWithOwner".to_string())
            .await?;
        Ok(out.stdout.parse()?)
    }

    /// Open review requests authored by the current user, caching each one.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ReviewRequest>, GatewayError> {
        let username = self.store.username()?;
        let repo = self.store.repo_path()?;

        let command = format!(
            "gh pr list --repo {} --author {} --state open --json {}",
            quote(&repo)?,
            quote(&username)?,
            REVIEW_REQUEST_FIELDS
        );
        let out = self.gh(command).await?;

        let requests: Vec<ReviewRequest> = if out.stdout.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&out.stdout)?
        };

        for pr in &requests {
            self.cache(pr.clone());
        }
        Ok(requests)
    }

    /// The review request whose head is `branch`, or `None` if there is none.
    #[instrument(skip(self))]
    pub async fn status(&self, branch: &str) -> Result<Option<ReviewRequest>, GatewayError> {
        if let Some(cached) = self.store.cached_review(branch) {
            self.store.debug(format!("github.pr_status HIT {branch}"));
            return Ok(Some(cached));
        }

        self.store.debug(format!("github.pr_status MISS {branch}"));
        self.fetch(branch).await
    }

    /// Opens a review request for `branch` against `base`.
    #[instrument(skip(self))]
    pub async fn create(&self, branch: &str, base: &str) -> Result<Option<ReviewRequest>, GatewayError> {
        let repo = self.store.repo_path()?;
        let command = format!(
            "gh pr create --fill --head {} --base {} --repo {}",
            quote(branch)?,
            quote(base)?,
            quote(&repo)?
        );
        self.gh(command).await?;
        self.fetch(branch).await
    }

    /// Retargets the review request for `branch` onto `base`.
    #[instrument(skip(self))]
    pub async fn set_base(&self, branch: &str, base: &str) -> Result<Option<ReviewRequest>, GatewayError> {
        let repo = self.store.repo_path()?;
        let command = format!(
            "gh pr edit {} --base {} --repo {}",
            quote(branch)?,
            quote(base)?,
            quote(&repo)?
        );
        self.gh(command).await?;
        self.fetch(branch).await
    }

    /// The description of the review request for `branch`.
    pub async fn body(&self, branch: &str) -> Result<String, GatewayError> {
        let repo = self.store.repo_path()?;
        let command = format!(
            "gh pr view {} --repo {} --json body --jq .body",
            quote(branch)?,
            quote(&repo)?
        );
        Ok(self.gh(command).await?.stdout)
    }

    /// Replaces the description of the review request for `branch`.
    #[instrument(skip(self, body))]
    pub async fn set_body(&self, branch: &str, body: &str) -> Result<(), GatewayError> {
        let repo = self.store.repo_path()?;

        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(body.as_bytes())?;
        file.flush()?;
        let path = file.path().to_string_lossy().into_owned();

        let command = format!(
            "gh pr edit {} --repo {} --body-file {}",
            quote(branch)?,
            quote(&repo)?,
            quote(&path)?
        );
        self.gh(command).await?;
        Ok(())
    }

    /// Drops every cached review request.
    pub fn reset(&self) {
        debug!("reset review cache");
        self.store.dispatch(Action::ResetReviewCache);
    }

    async fn fetch(&self, branch: &str) -> Result<Option<ReviewRequest>, GatewayError> {
        let repo = self.store.repo_path()?;
        let command = format!(
            "gh pr view {} --repo {} --json {}",
            quote(branch)?,
            quote(&repo)?,
            REVIEW_REQUEST_FIELDS
        );

        let out = self.runner.run(&command, RunOptions::ignore_exit_code()).await?;
        if !out.success() && out.output.contains(NOT_FOUND) {
            debug!(branch, "no review request");
            return Ok(None);
        }
        let out = self.check(out)?;

        let pr: ReviewRequest = serde_json::from_str(&out.stdout)?;
        self.cache(pr.clone());
        Ok(Some(pr))
    }

    fn cache(&self, pr: ReviewRequest) {
        self.store.dispatch(Action::CacheReviewRequest(Box::new(pr)));
    }

    async fn gh(&self, command: String) -> Result<CommandOutput, GatewayError> {
        let out = self.runner.run(&command, RunOptions::ignore_exit_code()).await?;
        self.check(out)
    }

    /// Turns a non-zero exit into a `github-api-error`.
    fn check(&self, out: CommandOutput) -> Result<CommandOutput, GatewayError> {
        if out.success() {
            return Ok(out);
        }

        warn!(command = %out.command, exit_code = out.exit_code, "gh command failed");
        self.store.dispatch(Action::GithubApiError {
            output: out.output.clone(),
        });
        Err(GithubApiError {
            command: out.command,
            exit_code: out.exit_code,
            output: out.output,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Step;
    use crate::test_utils::{MockRunner, review_json, review_request};

    fn gateway() -> (ReviewGateway<MockRunner>, MockRunner, Store) {
        let runner = MockRunner::new();
        let store = Store::new(true);
        store.dispatch(Action::Identity {
            username: "magus".to_string(),
            repo_path: "magus/git-stack".to_string(),
        });
        (ReviewGateway::new(runner.clone(), store.clone()), runner, store)
    }

    #[tokio::test]
    async fn status_miss_queries_then_hit_uses_cache() {
        let (gateway, runner, store) = gateway();
        let pr = review_request("magus-one", "master", 7);
        runner.respond("gh pr view magus-one", &review_json(&pr));

        let first = gateway.status("magus-one").await.unwrap();
        let second = gateway.status("magus-one").await.unwrap();

        assert_eq!(first, Some(pr.clone()));
        assert_eq!(second, Some(pr));
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(
            runner.calls()[0],
            format!("gh pr view magus-one --repo magus/git-stack --json {REVIEW_REQUEST_FIELDS}")
        );

        let debug: Vec<String> = store.snapshot().output.into_iter().map(|e| e.text).collect();
        assert_eq!(
            debug,
            vec!["github.pr_status MISS magus-one", "github.pr_status HIT magus-one"]
        );
    }

    #[tokio::test]
    async fn missing_request_is_none_and_not_cached() {
        let (gateway, runner, store) = gateway();
        runner.fail(
            "gh pr view magus-two",
            1,
            "no pull requests found for branch \"magus-two\"",
        );

        assert_eq!(gateway.status("magus-two").await.unwrap(), None);
        assert_eq!(gateway.status("magus-two").await.unwrap(), None);
        assert_eq!(runner.calls().len(), 2);
        assert_ne!(store.step(), Step::GithubApiError);
    }

    #[tokio::test]
    async fn failure_sets_github_api_error_step() {
        let (gateway, runner, store) = gateway();
        runner.fail("gh pr view", 1, "HTTP 502: Bad Gateway");

        let err = gateway.status("magus-one").await.unwrap_err();
        match err {
            GatewayError::Api(api) => {
                assert_eq!(api.exit_code, 1);
                assert_eq!(api.output, "HTTP 502: Bad Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.step(), Step::GithubApiError);
    }

    #[tokio::test]
    async fn every_review_operation_failure_sets_github_api_error_step() {
        for (prefix, operation) in [("gh pr list", "list"), ("gh pr create", "create"), ("gh pr edit", "set_base")] {
            let (gateway, runner, store) = gateway();
            runner.fail(prefix, 4, "HTTP 401: Bad credentials");

            let err = match operation {
                "list" => gateway.list().await.map(|_| ()),
                "create" => gateway.create("magus-one", "master").await.map(|_| ()),
                _ => gateway.set_base("magus-one", "magus-zero").await.map(|_| ()),
            }
            .unwrap_err();

            let api = match err {
                GatewayError::Api(api) => api,
                other => panic!("{operation}: unexpected error {other}"),
            };
            assert!(api.command.starts_with(prefix), "{operation}: {}", api.command);
            assert_eq!(api.exit_code, 4);
            assert_eq!(store.step(), Step::GithubApiError, "{operation}");
            assert!(!runner.called("gh pr view"), "{operation} fetched after failing");
        }
    }

    #[tokio::test]
    async fn list_caches_every_request() {
        let (gateway, runner, store) = gateway();
        let a = review_request("magus-a", "master", 1);
        let b = review_request("magus-b", "magus-a", 2);
        let json = serde_json::to_string(&vec![a.clone(), b.clone()]).unwrap();
        runner.respond("gh pr list", &json);

        let listed = gateway.list().await.unwrap();
        assert_eq!(listed, vec![a, b.clone()]);
        assert!(runner.calls()[0].contains("--author magus --state open"));

        assert_eq!(gateway.status("magus-b").await.unwrap(), Some(b));
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(store.snapshot().review_cache.len(), 2);
    }

    #[tokio::test]
    async fn create_refreshes_cache_entry() {
        let (gateway, runner, _store) = gateway();
        let pr = review_request("magus-a", "master", 3);
        runner.respond("gh pr view magus-a", &review_json(&pr));

        let created = gateway.create("magus-a", "master").await.unwrap();
        assert_eq!(created, Some(pr));
        assert_eq!(
            runner.calls()[0],
            "gh pr create --fill --head magus-a --base master --repo magus/git-stack"
        );

        gateway.status("magus-a").await.unwrap();
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn set_base_refreshes_stale_cache_entry() {
        let (gateway, runner, _store) = gateway();
        let before = review_request("magus-b", "master", 4);
        let after = review_request("magus-b", "magus-a", 4);
        runner.respond_once("gh pr view magus-b", &review_json(&before));
        runner.respond("gh pr view magus-b", &review_json(&after));

        assert_eq!(gateway.status("magus-b").await.unwrap(), Some(before));
        gateway.set_base("magus-b", "magus-a").await.unwrap();
        assert_eq!(gateway.status("magus-b").await.unwrap(), Some(after));
        assert!(runner.called("gh pr edit magus-b --base magus-a"));
    }

    #[tokio::test]
    async fn reset_forces_refetch() {
        let (gateway, runner, _store) = gateway();
        runner.respond(
            "gh pr view",
            &review_json(&review_request("magus-a", "master", 1)),
        );

        gateway.status("magus-a").await.unwrap();
        gateway.reset();
        gateway.status("magus-a").await.unwrap();
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn missing_identity_is_a_precondition_violation() {
        let runner = MockRunner::new();
        let gateway = ReviewGateway::new(runner.clone(), Store::new(false));

        let err = gateway.list().await.unwrap_err();
        assert!(matches!(err, GatewayError::Precondition(p) if p.field == "username"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn set_body_uploads_through_a_file() {
        let (gateway, runner, _store) = gateway();
        gateway.set_body("magus-a", "hello\n\n#### git stack").await.unwrap();

        let call = &runner.calls()[0];
        assert!(call.starts_with("gh pr edit magus-a --repo magus/git-stack --body-file "));
    }

    #[tokio::test]
    async fn identity_queries() {
        let (gateway, runner, _store) = gateway();
        runner.respond("gh api user", "magus\n");
        runner.respond("gh repo view", "magus/git-stack");

        assert_eq!(gateway.viewer_login().await.unwrap(), "magus");
        assert_eq!(gateway.repository().await.unwrap(), RepoId::new("magus", "git-stack"));
    }

    #[tokio::test]
    async fn malformed_repository_is_rejected() {
        let (gateway, runner, _store) = gateway();
        runner.respond("gh repo view", "not-a-repo\n");

        let err = gateway.repository().await.unwrap_err();
        assert!(matches!(err, GatewayError::Repository(_)));
    }
}
