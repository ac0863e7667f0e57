//! Line-based terminal frontend.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::rebase::Conflict;
use crate::store::{OutputEntry, OutputKind};
use crate::types::{CommitRange, Sha};
use crate::workflow::ui::{ManualResolution, Prompt, RangeSelection, SelectRequest, SelectedGroup, Ui};

/// Prints output to stdout and reads answers from stdin, one line at a time.
pub struct TerminalUi {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalUi {
    pub fn new() -> Self {
        TerminalUi {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn print(&self, text: &str) {
        let mut stdout = tokio::io::stdout();
        if let Err(err) = stdout.write_all(text.as_bytes()).await {
            warn!(error = %err, "failed to write to terminal");
        }
        let _ = stdout.flush().await;
    }

    /// Prints `question` and reads one line; `None` on end of input.
    async fn ask(&self, question: &str) -> Option<String> {
        self.print(question).await;
        match self.input.lock().await.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to read from terminal");
                None
            }
        }
    }
}

pub fn format_entry(entry: &OutputEntry) -> String {
    match entry.kind {
        OutputKind::Debug => format!("[debug] {}", entry.text),
        _ => entry.text.clone(),
    }
}

/// Empty input accepts the default answer, yes.
pub fn parse_confirm(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes")
}

/// Applies `<sha-prefix>=<id>` assignments to the range's existing layers.
pub fn apply_assignments(range: &CommitRange, line: &str) -> Result<RangeSelection, String> {
    let current = RangeSelection::keep_existing(range, false);
    let mut ids: HashMap<&Sha, String> = range
        .shas()
        .filter_map(|sha| Some((sha, current.id_for(sha)?.to_string())))
        .collect();

    for token in line.split_whitespace() {
        let (prefix, id) = token
            .split_once('=')
            .ok_or_else(|| format!("expected <commit>=<id>, got {token:?}"))?;
        if id.is_empty() {
            return Err(format!("empty id for {prefix}"));
        }
        let mut matches = range.shas().filter(|sha| sha.as_str().starts_with(prefix));
        let sha = match (matches.next(), matches.next()) {
            (Some(sha), None) if !prefix.is_empty() => sha,
            (Some(_), Some(_)) => return Err(format!("{prefix} is ambiguous")),
            _ => return Err(format!("no commit {prefix} in the stack")),
        };
        ids.insert(sha, id.to_string());
    }

    let mut groups: Vec<SelectedGroup> = Vec::new();
    for sha in range.shas() {
        let Some(id) = ids.get(sha) else { continue };
        match groups.iter_mut().find(|g| &g.id == id) {
            Some(group) => group.commits.push(sha.clone()),
            None => groups.push(SelectedGroup {
                id: id.clone(),
                commits: vec![sha.clone()],
            }),
        }
    }
    Ok(RangeSelection {
        groups,
        sync: false,
    })
}

impl Ui for TerminalUi {
    async fn render(&self, entries: &[OutputEntry]) {
        let mut text = String::new();
        for entry in entries {
            text.push_str(&format_entry(entry));
            text.push('\n');
        }
        self.print(&text).await;
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        let question = format!("{} [Y/n] ", prompt.question());
        self.ask(&question).await.is_some_and(|a| parse_confirm(&a))
    }

    async fn select_commit_ranges(&self, request: SelectRequest<'_>) -> Option<RangeSelection> {
        let mut listing = format!("\nCommits for {}:\n", request.username);
        for commit in request.commit_range.commits() {
            let id = commit.stack_id.as_deref().unwrap_or("-");
            listing.push_str(&format!("  {} [{id}] {}\n", commit.sha.short(), commit.subject));
        }
        self.print(&listing).await;

        let mut selection = loop {
            let line = self
                .ask("Enter to keep, <commit>=<id> to reassign, q to cancel: ")
                .await?;
            if line.trim() == "q" {
                return None;
            }
            match apply_assignments(request.commit_range, &line) {
                Ok(selection) => break selection,
                Err(message) => self.print(&format!("{message}\n")).await,
            }
        };

        let sync = self.ask("Push layers and update pull requests? [Y/n] ").await?;
        selection.sync = parse_confirm(&sync);
        Some(selection)
    }

    async fn await_manual_resolution(&self, conflict: &Conflict) -> ManualResolution {
        let question = format!(
            "Resolve {} in your working tree, `git add` the result, then press Enter (or type abort): ",
            conflict.sha.short()
        );
        match self.ask(&question).await.as_deref().map(str::trim) {
            None | Some("abort") => ManualResolution::Abort,
            Some(_) => ManualResolution::Continue,
        }
    }

    /// Erases the line of the prompt that was just answered.
    async fn clear(&self) {
        self.print("\x1b[1A\x1b[2K").await;
    }

    async fn unmount(&self) {
        let _ = tokio::io::stdout().flush().await;
    }
}
