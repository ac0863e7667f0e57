//! Shared test utilities: scripted collaborators and canned review requests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::process::{CommandOutput, ProcessError, ProcessRunner, RunOptions};
use crate::rebase::Conflict;
use crate::store::OutputEntry;
use crate::types::{PrNumber, PrState, ReviewRequest};
use crate::workflow::ui::{ManualResolution, Prompt, RangeSelection, SelectRequest, Ui};

/// Ordered record of everything the scripted collaborators saw.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    prefix: String,
    exit_code: i32,
    stdout: String,
    once: bool,
}

/// A [`ProcessRunner`] answering from a script of prefix-matched responses.
///
/// Responses are tried in registration order; the first whose prefix matches
/// wins, and `once` responses are consumed. Unmatched commands succeed with
/// empty output. Every command is recorded in the journal.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    script: Arc<Mutex<Vec<Scripted>>>,
    journal: Journal,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        MockRunner {
            script: Arc::default(),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn push(&self, prefix: &str, exit_code: i32, stdout: &str, once: bool) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Scripted {
                prefix: prefix.to_string(),
                exit_code,
                stdout: stdout.to_string(),
                once,
            });
        self
    }

    pub fn respond(&self, prefix: &str, stdout: &str) -> &Self {
        self.push(prefix, 0, stdout, false)
    }

    pub fn respond_once(&self, prefix: &str, stdout: &str) -> &Self {
        self.push(prefix, 0, stdout, true)
    }

    pub fn fail(&self, prefix: &str, exit_code: i32, output: &str) -> &Self {
        self.push(prefix, exit_code, output, false)
    }

    pub fn fail_once(&self, prefix: &str, exit_code: i32, output: &str) -> &Self {
        self.push(prefix, exit_code, output, true)
    }

    /// Commands run so far, without UI entries.
    pub fn calls(&self) -> Vec<String> {
        self.journal
            .entries()
            .into_iter()
            .filter(|e| !e.starts_with("ui:"))
            .collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn answer(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        self.journal.push(command);

        let (exit_code, stdout) = {
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            match script.iter().position(|s| command.starts_with(&s.prefix)) {
                Some(index) => {
                    let entry = if script[index].once {
                        script.remove(index)
                    } else {
                        script[index].clone()
                    };
                    (entry.exit_code, entry.stdout)
                }
                None => (0, String::new()),
            }
        };

        if exit_code != 0 && !options.ignore_exit_code {
            return Err(ProcessError::NonZeroExit {
                command: command.to_string(),
                code: exit_code,
                output: stdout,
            });
        }

        Ok(CommandOutput {
            command: command.to_string(),
            exit_code,
            output: stdout.clone(),
            stdout,
            stderr: String::new(),
        })
    }
}

impl ProcessRunner for MockRunner {
    async fn run(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        self.answer(command, options)
    }

    fn run_sync(&self, command: &str, options: RunOptions) -> Result<CommandOutput, ProcessError> {
        self.answer(command, options)
    }
}

/// A [`Ui`] answering prompts from queues and journaling every call as `ui:*`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedUi {
    journal: Journal,
    confirms: Arc<Mutex<VecDeque<bool>>>,
    selections: Arc<Mutex<VecDeque<Option<RangeSelection>>>>,
    resolutions: Arc<Mutex<VecDeque<ManualResolution>>>,
    rendered: Arc<Mutex<Vec<OutputEntry>>>,
}

impl ScriptedUi {
    pub fn with_journal(journal: Journal) -> Self {
        ScriptedUi {
            journal,
            ..Self::default()
        }
    }

    pub fn confirm_with(self, answer: bool) -> Self {
        self.confirms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer);
        self
    }

    pub fn select_with(self, selection: Option<RangeSelection>) -> Self {
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(selection);
        self
    }

    pub fn resolve_with(self, resolution: ManualResolution) -> Self {
        self.resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(resolution);
        self
    }

    pub fn rendered(&self) -> Vec<OutputEntry> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn rendered_text(&self) -> String {
        self.rendered()
            .into_iter()
            .map(|e| e.text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Ui for ScriptedUi {
    async fn render(&self, entries: &[OutputEntry]) {
        self.journal.push("ui:render");
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(entries);
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        self.journal.push(format!("ui:confirm {prompt:?}"));
        self.confirms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }

    async fn select_commit_ranges(&self, _request: SelectRequest<'_>) -> Option<RangeSelection> {
        self.journal.push("ui:select");
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten()
    }

    async fn await_manual_resolution(&self, conflict: &Conflict) -> ManualResolution {
        self.journal.push(format!("ui:manual {}", conflict.sha));
        self.resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ManualResolution::Abort)
    }

    async fn clear(&self) {
        self.journal.push("ui:clear");
    }

    async fn unmount(&self) {
        self.journal.push("ui:unmount");
    }
}

/// A review request with a deterministic url for `number`.
pub fn review_request(branch: &str, base: &str, number: u64) -> ReviewRequest {
    ReviewRequest {
        number: PrNumber(number),
        state: PrState::Open,
        base_branch: base.to_string(),
        head_branch: branch.to_string(),
        commits: Vec::new(),
        title: format!("{branch} title"),
        url: format!("https://github.com/magus/git-stack/pull/{number}"),
    }
}

/// `gh` JSON for `pr`.
pub fn review_json(pr: &ReviewRequest) -> String {
    serde_json::to_string(pr).unwrap()
}
