//! Extracts the annotation block from a description.

use std::sync::LazyLock;

use regex::Regex;

use super::{HEADING, StackEntries, StackEntry};

static ENTRY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- (\S+) `(\d+)` (\S+)$").expect("entry pattern is valid"));

/// A description split at the block heading.
#[derive(Debug)]
pub(crate) struct Split<'a> {
    /// Everything before the heading line (the whole text when there is none).
    pub free_body: &'a str,
    /// Parsed entries, or `None` when the text has no heading.
    pub block: Option<StackEntries>,
}

/// Splits `text` at the first line equal to [`HEADING`].
pub(crate) fn split(text: &str) -> Split<'_> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == HEADING {
            let rest = &text[offset + line.len()..];
            return Split {
                free_body: &text[..offset],
                block: Some(parse_entries(rest)),
            };
        }
        offset += line.len();
    }

    Split {
        free_body: text,
        block: None,
    }
}

/// Parses the block out of `text`, in order of appearance.
///
/// Returns an empty map when there is no heading.
pub fn parse(text: &str) -> StackEntries {
    split(text).block.unwrap_or_default()
}

/// Parses one entry line, `None` if it does not follow the grammar.
pub fn parse_entry(line: &str) -> Option<StackEntry> {
    let caps = ENTRY_LINE.captures(line.trim_end())?;
    let icon = caps[1].parse().ok()?;
    let ordinal = caps[2].parse().ok()?;
    Some(StackEntry {
        url: caps[3].to_string(),
        ordinal,
        icon,
    })
}

fn parse_entries(block: &str) -> StackEntries {
    let mut entries = StackEntries::new();
    for entry in block.lines().filter_map(parse_entry) {
        entries.entry(entry.url.clone()).or_insert(entry);
    }
    entries
}
