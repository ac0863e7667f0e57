//! Commit metadata, commit ranges, and the grouping of commits into stack layers.
//!
//! A commit joins a layer through a `git-stack-id: <id>` trailer in its message.
//! Commits sharing an id form one layer (one branch, one pull request), and
//! layers are ordered by where their first commit sits in the range.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{InvalidSha, Sha};

/// The trailer key that assigns a commit to a stack layer.
pub const STACK_ID_TRAILER: &str = "git-stack-id";

/// `git log` format producing one record per commit for [`CommitRange::from_git_log`].
///
/// Fields are separated by the ASCII unit separator and records by the record
/// separator, so multi-line messages survive intact.
pub const GIT_LOG_FORMAT: &str = "%H%x1f%an%x1f%ae%x1f%aI%x1f%s%x1f%B%x1e";

const FIELD_SEPARATOR: char = '\x1f';
const RECORD_SEPARATOR: char = '\x1e';

/// Errors from parsing `git log` output.
#[derive(Debug, Error)]
pub enum CommitParseError {
    #[error("malformed git log record: {0:?}")]
    MalformedRecord(String),

    #[error(transparent)]
    InvalidSha(#[from] InvalidSha),
}

/// One local commit in the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub sha: Sha,
    pub subject: String,
    /// The full message, subject included.
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// Strict ISO 8601 author date, kept verbatim so replays preserve the offset.
    pub author_date: String,
    pub stack_id: Option<String>,
}

/// Extracts the stack id from the last `git-stack-id:` trailer in a message.
pub fn stack_id_from_message(message: &str) -> Option<String> {
    message
        .lines()
        .rev()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            (key.trim() == STACK_ID_TRAILER).then(|| value.trim().to_string())
        })
        .find(|value| !value.is_empty() && !value.contains(char::is_whitespace))
}

/// Returns `message` with exactly one `git-stack-id` trailer carrying `id`.
pub fn with_stack_id(message: &str, id: &str) -> String {
    let kept: Vec<&str> = message
        .lines()
        .filter(|line| {
            line.trim()
                .split_once(':')
                .is_none_or(|(key, _)| key.trim() != STACK_ID_TRAILER)
        })
        .collect();
    let body = kept.join("\n");
    format!("{}\n\n{}: {}", body.trim_end(), STACK_ID_TRAILER, id)
}

/// The branch name used for the layer with stack id `id`.
pub fn layer_branch(username: &str, id: &str) -> String {
    format!("{username}-{id}")
}

/// Commits between the merge base (exclusive) and head (inclusive), oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRange {
    commits: Vec<CommitMetadata>,
}

impl CommitRange {
    pub fn new(commits: Vec<CommitMetadata>) -> Self {
        CommitRange { commits }
    }

    /// Parses `git log --reverse --format=GIT_LOG_FORMAT` output.
    pub fn from_git_log(raw: &str) -> Result<Self, CommitParseError> {
        let mut commits = Vec::new();
        for record in raw.split(RECORD_SEPARATOR) {
            let record = record.trim_start_matches(['\n', '\r']);
            if record.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = record.splitn(6, FIELD_SEPARATOR).collect();
            let [sha, name, email, date, subject, message] = fields[..] else {
                return Err(CommitParseError::MalformedRecord(record.to_string()));
            };

            let message = message.trim_end().to_string();
            commits.push(CommitMetadata {
                sha: Sha::parse(sha)?,
                subject: subject.to_string(),
                stack_id: stack_id_from_message(&message),
                message,
                author_name: name.to_string(),
                author_email: email.to_string(),
                author_date: date.to_string(),
            });
        }
        Ok(CommitRange { commits })
    }

    pub fn commits(&self) -> &[CommitMetadata] {
        &self.commits
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// The newest commit; equals the repository head whenever the range is non-empty.
    pub fn head(&self) -> Option<&Sha> {
        self.commits.last().map(|c| &c.sha)
    }

    pub fn shas(&self) -> impl Iterator<Item = &Sha> {
        self.commits.iter().map(|c| &c.sha)
    }

    /// Commits that belong to no layer yet.
    pub fn unassigned(&self) -> impl Iterator<Item = &CommitMetadata> {
        self.commits.iter().filter(|c| c.stack_id.is_none())
    }

    /// Gives every unassigned commit a synthetic stack id (its short sha).
    pub fn with_mock_metadata(mut self) -> Self {
        for commit in &mut self.commits {
            if commit.stack_id.is_none() {
                commit.stack_id = Some(commit.sha.short().to_string());
            }
        }
        self
    }
}

/// One stack layer: the commits that share a stack id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitGroup {
    pub id: String,
    pub branch: String,
    /// Subject of the layer's first commit, used as the PR title.
    pub title: String,
    pub commits: Vec<Sha>,
}

impl CommitGroup {
    /// The commit the layer's branch should point at.
    pub fn tip(&self) -> Option<&Sha> {
        self.commits.last()
    }
}

/// Layer branch name to its commits, in stack order.
pub type CommitMap = IndexMap<String, CommitGroup>;

/// Groups the range's assigned commits into layers.
pub fn build_commit_map(range: &CommitRange, username: &str) -> CommitMap {
    let mut map = CommitMap::new();
    for commit in range.commits() {
        let Some(id) = &commit.stack_id else {
            continue;
        };
        let branch = layer_branch(username, id);
        map.entry(branch.clone())
            .or_insert_with(|| CommitGroup {
                id: id.clone(),
                branch,
                title: commit.subject.clone(),
                commits: Vec::new(),
            })
            .commits
            .push(commit.sha.clone());
    }
    map
}
