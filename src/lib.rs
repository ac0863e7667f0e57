//! git-stack - keeps a stack of dependent branches and their pull requests in sync.
//!
//! Commits on the current branch carry a `git-stack-id` trailer; commits that
//! share an id form a layer. Each layer is pushed to its own branch and gets a
//! pull request targeting the layer below it.

pub mod annotation;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod process;
pub mod rebase;
pub mod store;
pub mod terminal;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_utils;
