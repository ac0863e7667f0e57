//! Stack annotation block embedded in pull request descriptions.
//!
//! The block records stack order and per-layer status below the free-form
//! description, without touching the text above it.
//!
//! # Format
//!
//! ```text
//! Free-form description, passed through unchanged.
//!
//! #### git stack
//! - ⏳ `3` https://github.com/owner/repo/pull/61
//! - 👉 `2` https://github.com/owner/repo/pull/54
//! - ✅ `1` https://github.com/owner/repo/pull/47
//! ```
//!
//! Only lines under the exact heading are entries; anything under the heading
//! that does not match the entry grammar is dropped, including entries whose
//! ordinal does not fit in a `u64`. An ordinal, once given to a url, is kept
//! for as long as that url stays in the block, unless the block has run out of
//! ordinals and is renumbered from 1.

pub mod format;
pub mod parse;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use format::{WriteArgs, write};
pub use parse::{parse, parse_entry};

/// The line that begins the block.
pub const HEADING: &str = "#### git stack";

/// Status marker for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    /// The request whose description is being written.
    Current,
    /// Still part of the active stack.
    Pending,
    /// Dropped from the active stack (usually merged).
    Done,
}

impl Icon {
    pub fn marker(&self) -> &'static str {
        match self {
            Icon::Current => "👉",
            Icon::Pending => "⏳",
            Icon::Done => "✅",
        }
    }
}

impl FromStr for Icon {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "👉" => Ok(Icon::Current),
            "⏳" => Ok(Icon::Pending),
            "✅" => Ok(Icon::Done),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One line of the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEntry {
    pub url: String,
    pub ordinal: u64,
    pub icon: Icon,
}

impl fmt::Display for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- {} `{}` {}", self.icon, self.ordinal, self.url)
    }
}

/// Entries keyed by url, in order of appearance.
pub type StackEntries = IndexMap<String, StackEntry>;
