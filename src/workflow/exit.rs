//! Ending a run.

use tracing::{error, info};

use crate::git;
use crate::process::ProcessRunner;
use crate::store::{Action, OutputEntry, Store};

use super::ExitRequest;
use super::ui::Ui;

/// Restores the dirty-check stash, flushes output and tears the UI down.
///
/// The stash is popped before anything else so local changes come back even
/// when the run failed. A failed pop turns a successful exit into a failure.
pub async fn exit<R: ProcessRunner, U: Ui>(
    runner: &R,
    ui: &U,
    store: &Store,
    request: ExitRequest,
    rendered: &mut usize,
) -> i32 {
    let mut code = request.code;

    if store.is_dirty_check_stash() {
        match git::stash_pop(runner).await {
            Ok(()) => {
                store.dispatch(Action::StashRestored);
                store.output(OutputEntry::success("✅ Changes restored from stash"));
            }
            Err(err) => {
                error!(error = %err, "failed to restore stash");
                store.output(OutputEntry::error(format!(
                    "🚨 Unable to restore stash, run `git stash pop` by hand\n{err}"
                )));
                if code == 0 {
                    code = 1;
                }
            }
        }
    }

    super::flush(ui, store, rendered).await;
    // Let the last frame reach the terminal before tearing down.
    tokio::task::yield_now().await;

    if request.clear {
        ui.clear().await;
    }
    ui.unmount().await;

    info!(code, "exit");
    code
}
