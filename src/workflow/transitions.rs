//! Step transitions for the workflow state machine.
//!
//! Pure functions: the step handlers report an [`Event`] and [`next_step`]
//! decides where the run goes next.

use crate::store::Step;

/// What a step handler observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Repository identity and commit range resolved.
    Loaded,

    /// `--check`: the status table was the whole job.
    CheckOnly,

    /// The remote base branch moved past the local merge base.
    DriftDetected,

    /// Unassigned commits, or layers whose review request is missing,
    /// closed, or out of date.
    LayersStale,

    /// `--force` with nothing else to do.
    Forced,

    UpToDate,

    Confirmed,
    Declined,

    /// Stack replayed onto the new base; `stale` says whether layers still
    /// need reassignment.
    Rebased { stale: bool },

    /// Commit ranges rewritten and replayed cleanly.
    Replayed,

    /// A replay stopped on a conflict; `sync` says whether layers are pushed
    /// once it is resolved.
    Conflict { sync: bool },

    /// The user finished a manual conflict resolution.
    Resolved,

    /// The user gave up on a manual conflict resolution.
    Aborted,

    Done,
}

/// How the process should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRequest {
    pub code: i32,
    /// Clear the display before unmounting.
    pub clear: bool,
}

impl ExitRequest {
    pub fn success() -> Self {
        ExitRequest {
            code: 0,
            clear: false,
        }
    }

    pub fn failure() -> Self {
        ExitRequest {
            code: 1,
            clear: false,
        }
    }

    /// Successful exit that also erases the answered prompt.
    pub fn dismissed() -> Self {
        ExitRequest {
            code: 0,
            clear: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(Step),
    Exit(ExitRequest),
}

/// Error returned when a step transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The event is not allowed from the current step.
    InvalidTransition { from: Step, event: Event },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::InvalidTransition { from, event } => {
                write!(f, "Invalid transition from {} with event {:?}", from, event)
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Computes the next step from the current step and the event it reported.
pub fn next_step(current: Step, event: Event) -> Result<Transition, TransitionError> {
    use Transition::{Exit, To};

    match (current, event) {
        // Terminal: whatever happened, the run failed.
        (Step::GithubApiError, _) => Ok(Exit(ExitRequest::failure())),

        (Step::Loading, Event::Loaded) => Ok(To(Step::Status)),

        // === Status ===
        (Step::Status, Event::CheckOnly | Event::UpToDate) => Ok(Exit(ExitRequest::success())),
        (Step::Status, Event::DriftDetected | Event::Forced) => Ok(To(Step::PreLocalMergeRebase)),
        (Step::Status, Event::LayersStale) => Ok(To(Step::PreSelectCommitRanges)),

        // === Gates ===
        (Step::PreLocalMergeRebase, Event::Confirmed) => Ok(To(Step::LocalMergeRebase)),
        (Step::PreSelectCommitRanges, Event::Confirmed) => Ok(To(Step::SelectCommitRanges)),
        (Step::PreLocalMergeRebase | Step::PreSelectCommitRanges, Event::Declined) => {
            Ok(Exit(ExitRequest::dismissed()))
        }

        // === Local merge rebase ===
        (Step::LocalMergeRebase, Event::Rebased { stale: true }) => {
            Ok(To(Step::PreSelectCommitRanges))
        }
        (Step::LocalMergeRebase, Event::Rebased { stale: false }) => Ok(To(Step::PostRebaseStatus)),
        // A half-rebased stack is never pushed.
        (Step::LocalMergeRebase, Event::Conflict { sync: false }) => {
            Ok(To(Step::ManualRebaseNoSync))
        }

        // === Commit range selection ===
        (Step::SelectCommitRanges, Event::Replayed) => Ok(To(Step::PostRebaseStatus)),
        (Step::SelectCommitRanges, Event::Conflict { sync: true }) => Ok(To(Step::ManualRebase)),
        (Step::SelectCommitRanges, Event::Conflict { sync: false }) => {
            Ok(To(Step::ManualRebaseNoSync))
        }
        (Step::SelectCommitRanges, Event::Declined) => Ok(Exit(ExitRequest::success())),

        // === Manual rebase ===
        (Step::ManualRebase | Step::ManualRebaseNoSync, Event::Resolved) => {
            Ok(To(Step::PostRebaseStatus))
        }
        (Step::ManualRebase | Step::ManualRebaseNoSync, Event::Aborted) => {
            Ok(Exit(ExitRequest::failure()))
        }

        (Step::PostRebaseStatus, Event::Done) => Ok(Exit(ExitRequest::success())),

        (from, event) => Err(TransitionError::InvalidTransition { from, event }),
    }
}
