//! Review request (pull request) records as reported by the GitHub CLI.
//!
//! Field names follow `gh pr view --json number,state,baseRefName,headRefName,commits,title,url`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PrNumber, Sha};

/// The JSON fields requested from `gh` for every review request query.
pub const REVIEW_REQUEST_FIELDS: &str = "number,state,baseRefName,headRefName,commits,title,url";

/// The state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    /// `gh pr view` reports merged requests separately from closed ones.
    Merged,
}

impl PrState {
    /// Returns true if the PR is open.
    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }
}

/// A commit author as listed on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: String,
}

/// A commit as listed on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrCommit {
    pub authored_date: DateTime<Utc>,
    #[serde(default)]
    pub authors: Vec<CommitAuthor>,
    pub committed_date: DateTime<Utc>,
    #[serde(default)]
    pub message_body: String,
    #[serde(default)]
    pub message_headline: String,
    pub oid: Sha,
}

/// The last-known state of a review request, keyed by its head branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub number: PrNumber,
    pub state: PrState,
    #[serde(rename = "baseRefName")]
    pub base_branch: String,
    #[serde(rename = "headRefName")]
    pub head_branch: String,
    #[serde(default)]
    pub commits: Vec<PrCommit>,
    pub title: String,
    pub url: String,
}

impl ReviewRequest {
    /// Commit ids on the request, oldest first.
    pub fn commit_shas(&self) -> impl Iterator<Item = &Sha> {
        self.commits.iter().map(|c| &c.oid)
    }
}
