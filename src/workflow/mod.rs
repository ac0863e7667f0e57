//! The workflow state machine.
//!
//! [`Workflow`] runs one step handler at a time. Each handler performs its
//! side effects, dispatches what it learned to the [`Store`] and reports an
//! [`Event`]; [`next_step`] turns that into the next step or an exit.
//!
//! ```text
//! loading -> status -+-> pre-local-merge-rebase -> local-merge-rebase -+
//!                    |                                                  |
//!                    +-> pre-select-commit-ranges <---------------------+
//!                              |
//!                              v
//!                      select-commit-ranges -> manual-rebase[-no-sync]
//!                              |                      |
//!                              v                      v
//!                      post-rebase-status <-----------+
//! ```

mod exit;
pub mod status;
mod sync;
mod transitions;
pub mod ui;

pub use exit::exit;
pub use sync::sync_layers;
pub use transitions::{Event, ExitRequest, Transition, TransitionError, next_step};

use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{WorkflowError, require};
use crate::git::{self, ResolveOptions};
use crate::github::ReviewGateway;
use crate::process::ProcessRunner;
use crate::rebase::{self, Conflict, RebaseStrategy, ReplayOptions, incremental};
use crate::store::{Action, OutputEntry, Step, Store};
use crate::types::{CommitRange, Sha};

use ui::{ManualResolution, Prompt, SelectRequest, Ui};

/// A replay stopped on a conflict, waiting for the user.
#[derive(Debug)]
struct PendingReplay {
    range: CommitRange,
    new_base: Sha,
    original_head: Sha,
    options: ReplayOptions,
    conflict: Conflict,
    /// The conflicted cherry-pick is checked out in the working tree.
    on_disk: bool,
}

/// Drives a run from `loading` to exit.
pub struct Workflow<R, U> {
    runner: R,
    ui: U,
    config: Config,
    store: Store,
    gateway: ReviewGateway<R>,
    pending: Option<PendingReplay>,
    /// Output entries already handed to the UI.
    rendered: usize,
}

/// Hands output appended since `rendered` to the UI.
pub(crate) async fn flush<U: Ui>(ui: &U, store: &Store, rendered: &mut usize) {
    let entries = store.output_since(*rendered);
    if entries.is_empty() {
        return;
    }
    *rendered += entries.len();
    ui.render(&entries).await;
}

impl<R: ProcessRunner + Clone, U: Ui> Workflow<R, U> {
    pub fn new(runner: R, ui: U, config: Config) -> Self {
        let store = Store::new(config.verbose);
        let gateway = ReviewGateway::new(runner.clone(), store.clone());
        Workflow {
            runner,
            ui,
            config,
            store,
            gateway,
            pending: None,
            rendered: 0,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Runs to completion and returns the process exit code.
    pub async fn run(mut self) -> i32 {
        let request = match self.drive().await {
            Ok(request) => request,
            Err(err) => {
                error!(step = %self.store.step(), error = %err, "run failed");
                self.store.output(OutputEntry::error(format!("🚨 {err}")));
                ExitRequest::failure()
            }
        };
        exit(&self.runner, &self.ui, &self.store, request, &mut self.rendered).await
    }

    async fn drive(&mut self) -> Result<ExitRequest, WorkflowError> {
        self.persist()?;
        loop {
            let step = self.store.step();
            let event = match self.execute(step).await {
                Ok(event) => event,
                // The gateway has already moved the run to `github-api-error`.
                Err(err) if err.github_api_error().is_some() => {
                    warn!(%step, error = %err, "review tool failed");
                    Event::Done
                }
                Err(err) => return Err(err),
            };

            let current = self.store.step();
            match next_step(current, event)? {
                Transition::To(next) => {
                    info!(from = %current, to = %next, ?event, "transition");
                    self.store.dispatch(Action::SetStep(next));
                    self.persist()?;
                    self.flush().await;
                }
                Transition::Exit(request) => {
                    info!(from = %current, ?event, code = request.code, "finished");
                    self.persist()?;
                    return Ok(request);
                }
            }
        }
    }

    async fn execute(&mut self, step: Step) -> Result<Event, WorkflowError> {
        match step {
            Step::Loading => self.load().await,
            Step::Status => self.status().await,
            Step::PreLocalMergeRebase => self.gate(Prompt::LocalMergeRebase).await,
            Step::LocalMergeRebase => self.local_merge_rebase().await,
            Step::PreSelectCommitRanges => self.gate(Prompt::SelectCommitRanges).await,
            Step::SelectCommitRanges => self.select_commit_ranges().await,
            Step::ManualRebase => self.manual_rebase(true).await,
            Step::ManualRebaseNoSync => self.manual_rebase(false).await,
            Step::PostRebaseStatus => self.post_rebase_status().await,
            Step::GithubApiError => Ok(Event::Done),
        }
    }

    fn persist(&self) -> Result<(), WorkflowError> {
        if self.config.write_state_json() {
            self.store.write_json(&self.config.state_json_path)?;
        }
        Ok(())
    }

    async fn flush(&mut self) {
        flush(&self.ui, &self.store, &mut self.rendered).await;
    }

    #[instrument(skip(self))]
    async fn load(&mut self) -> Result<Event, WorkflowError> {
        if git::is_dirty(&self.runner).await? {
            git::stash(&self.runner).await?;
            self.store.dispatch(Action::DirtyCheckStashed);
            self.store.output(OutputEntry::warning("📦 Changes saved to stash"));
        }

        let username = self.gateway.viewer_login().await?;
        let repository = self.gateway.repository().await?;
        self.store.dispatch(Action::Identity {
            username,
            repo_path: repository.to_string(),
        });

        if self.config.rebase == RebaseStrategy::InMemory {
            self.check_in_memory_support().await?;
        }

        let master_branch = match &self.config.branch {
            Some(branch) => branch.clone(),
            None => git::detect_master_branch(&self.runner).await?,
        };
        git::fetch_branch(&self.runner, &master_branch).await?;
        self.resolve(&master_branch).await?;

        if self.config.debug {
            let commit_map = self.store.commit_map()?;
            self.store.output(OutputEntry::json(&commit_map)?);
        }

        Ok(Event::Loaded)
    }

    async fn resolve(&self, master_branch: &str) -> Result<(), WorkflowError> {
        let username = self.store.username()?;
        let snapshot = git::resolve(
            &self.runner,
            ResolveOptions {
                username: &username,
                master_branch,
                mock_metadata: self.config.mock_metadata(),
            },
        )
        .await?;
        self.store.dispatch(Action::RepositoryResolved(Box::new(snapshot)));
        Ok(())
    }

    /// Re-reads the repository after history changed and forgets cached reviews.
    async fn refresh(&self) -> Result<(), WorkflowError> {
        let master_branch = self.store.master_branch()?;
        self.resolve(&master_branch).await?;
        self.gateway.reset();
        Ok(())
    }

    /// Falls back to the on-disk strategy when git lacks `merge-tree --merge-base`.
    async fn check_in_memory_support(&mut self) -> Result<(), WorkflowError> {
        let Some((major, minor)) = git::version(&self.runner).await? else {
            return Ok(());
        };
        if (major, minor) < git::MERGE_TREE_MIN_VERSION {
            let (need_major, need_minor) = git::MERGE_TREE_MIN_VERSION;
            warn!(major, minor, "git too old for in-memory rebase");
            self.store.output(OutputEntry::warning(format!(
                "⚠️ git {major}.{minor} cannot rebase in memory (needs {need_major}.{need_minor}), using incremental-disk"
            )));
            self.config.rebase = RebaseStrategy::IncrementalDisk;
        }
        Ok(())
    }

    async fn status(&mut self) -> Result<Event, WorkflowError> {
        let status = status::evaluate(&self.gateway, &self.store).await?;
        for entry in status.render() {
            self.store.output(entry);
        }

        let event = if self.config.check {
            Event::CheckOnly
        } else if status.drift {
            Event::DriftDetected
        } else if status.is_stale() {
            Event::LayersStale
        } else if self.config.force {
            Event::Forced
        } else {
            self.store.output(OutputEntry::success("✅ Everything up to date"));
            Event::UpToDate
        };
        Ok(event)
    }

    async fn gate(&mut self, prompt: Prompt) -> Result<Event, WorkflowError> {
        if self.config.force {
            self.store.debug(format!("--force confirms {prompt:?}"));
            return Ok(Event::Confirmed);
        }
        self.flush().await;
        if self.ui.confirm(prompt).await {
            Ok(Event::Confirmed)
        } else {
            Ok(Event::Declined)
        }
    }

    #[instrument(skip(self))]
    async fn local_merge_rebase(&mut self) -> Result<Event, WorkflowError> {
        let range = self.store.commit_range()?;
        let new_base = self.store.upstream_head()?;
        let original_head = self.store.head()?;
        let options = ReplayOptions::new(self.config.verify);

        let outcome =
            rebase::reconcile(&self.runner, &range, &new_base, self.config.rebase, &options).await?;
        if let Some(conflict) = outcome.conflict() {
            self.pending = Some(PendingReplay {
                conflict: conflict.clone(),
                on_disk: self.config.rebase == RebaseStrategy::IncrementalDisk,
                range,
                new_base,
                original_head,
                options,
            });
            return Ok(Event::Conflict { sync: false });
        }

        self.refresh().await?;
        let master_branch = self.store.master_branch()?;
        self.store.output(OutputEntry::success(format!(
            "✅ Rebased onto origin/{master_branch}"
        )));

        let stale =
            self.config.force || status::evaluate(&self.gateway, &self.store).await?.is_stale();
        Ok(Event::Rebased { stale })
    }

    #[instrument(skip(self))]
    async fn select_commit_ranges(&mut self) -> Result<Event, WorkflowError> {
        let range = self.store.commit_range()?;
        let commit_map = self.store.commit_map()?;
        let username = self.store.username()?;

        self.flush().await;
        let selection = self
            .ui
            .select_commit_ranges(SelectRequest {
                username: &username,
                commit_range: &range,
                commit_map: &commit_map,
            })
            .await;
        let Some(selection) = selection else {
            self.store.output(OutputEntry::text("Selection cancelled"));
            return Ok(Event::Declined);
        };

        let options =
            ReplayOptions::new(self.config.verify).with_rewrites(selection.rewrites(&range));
        let new_base = self.store.merge_base()?;
        let original_head = self.store.head()?;

        let outcome =
            rebase::reconcile(&self.runner, &range, &new_base, self.config.rebase, &options).await?;
        if let Some(conflict) = outcome.conflict() {
            self.pending = Some(PendingReplay {
                conflict: conflict.clone(),
                on_disk: self.config.rebase == RebaseStrategy::IncrementalDisk,
                range,
                new_base,
                original_head,
                options,
            });
            return Ok(Event::Conflict {
                sync: selection.sync,
            });
        }

        self.refresh().await?;
        if selection.sync {
            sync_layers(&self.runner, &self.gateway, &self.store, self.config.verify).await?;
        }
        Ok(Event::Replayed)
    }

    #[instrument(skip(self))]
    async fn manual_rebase(&mut self, sync: bool) -> Result<Event, WorkflowError> {
        let mut pending = require(self.pending.take(), "pending_replay")?;

        // An in-memory conflict left nothing on disk to resolve.
        if !pending.on_disk {
            info!("replaying on disk for manual resolution");
            let outcome = incremental::replay(
                &self.runner,
                &pending.range,
                &pending.new_base,
                &pending.options,
            )
            .await?;
            pending.on_disk = true;
            match outcome.conflict() {
                Some(conflict) => pending.conflict = conflict.clone(),
                None => return self.finish_manual_rebase(sync).await,
            }
        }

        loop {
            let conflict = &pending.conflict;
            self.store.output(OutputEntry::warning(format!(
                "⚠️ Conflict replaying {} ({}/{}). Resolve it, stage the result and continue.\n{}",
                conflict.sha.short(),
                conflict.index + 1,
                pending.range.len(),
                conflict.output.trim_end()
            )));
            self.flush().await;

            match self.ui.await_manual_resolution(&pending.conflict).await {
                ManualResolution::Abort => {
                    incremental::abort(&self.runner, &pending.original_head).await?;
                    self.store.output(OutputEntry::error(format!(
                        "Rebase aborted, restored {}",
                        pending.original_head.short()
                    )));
                    return Ok(Event::Aborted);
                }
                ManualResolution::Continue => {
                    let outcome = incremental::resume(
                        &self.runner,
                        &pending.range,
                        &pending.conflict,
                        &pending.options,
                    )
                    .await?;
                    match outcome.conflict() {
                        Some(conflict) => pending.conflict = conflict.clone(),
                        None => break,
                    }
                }
            }
        }

        self.finish_manual_rebase(sync).await
    }

    async fn finish_manual_rebase(&mut self, sync: bool) -> Result<Event, WorkflowError> {
        self.refresh().await?;
        self.store.output(OutputEntry::success("✅ Conflicts resolved"));
        if sync {
            sync_layers(&self.runner, &self.gateway, &self.store, self.config.verify).await?;
        }
        Ok(Event::Resolved)
    }

    async fn post_rebase_status(&mut self) -> Result<Event, WorkflowError> {
        let status = status::evaluate(&self.gateway, &self.store).await?;
        for entry in status.render() {
            self.store.output(entry);
        }
        Ok(Event::Done)
    }
}
