//! Core domain types for the stack synchronization engine.
//!
//! This module contains the fundamental types used throughout the application,
//! designed to encode invariants via the type system.

pub mod commit;
pub mod ids;
pub mod pr;

// Re-export commonly used types at the module level
pub use commit::{
    CommitGroup, CommitMap, CommitMetadata, CommitParseError, CommitRange, build_commit_map,
    layer_branch, stack_id_from_message, with_stack_id,
};
pub use ids::{InvalidRepoId, InvalidSha, PrNumber, RepoId, Sha};
pub use pr::{CommitAuthor, PrCommit, PrState, REVIEW_REQUEST_FIELDS, ReviewRequest};
