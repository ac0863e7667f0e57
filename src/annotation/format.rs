//! Renders the annotation block into a description.

use indexmap::{IndexMap, IndexSet};

use super::parse::{Split, split};
use super::{HEADING, Icon, StackEntry};

/// Inputs to [`write`].
#[derive(Debug, Clone, Copy)]
pub struct WriteArgs<'a> {
    /// The current description, possibly already carrying a block.
    pub body: &'a str,
    /// Urls of the requests in the active stack, bottom first.
    pub active_urls: &'a [String],
    /// The request whose description this is.
    pub selected_url: &'a str,
}

/// Returns `body` with its annotation block rewritten for the active stack.
///
/// Previously listed urls keep their ordinals; new urls get the next ordinals
/// in active-list order. Urls that left the active list stay in the block
/// marked done. Lines render highest ordinal first. A block whose ordinals
/// leave no room for the new urls is renumbered from 1 in its existing order.
///
/// With no active urls and no existing block, `body` is returned unchanged.
/// With no active urls but an existing block, the block is kept and every
/// entry renders as done.
pub fn write(args: WriteArgs<'_>) -> String {
    let Split { free_body, block } = split(args.body);

    if args.active_urls.is_empty() && block.is_none() {
        return args.body.to_string();
    }

    let previous = block.unwrap_or_default();

    let mut ordinals: IndexMap<&str, u64> = previous
        .values()
        .map(|entry| (entry.url.as_str(), entry.ordinal))
        .collect();

    let fresh: IndexSet<&str> = args
        .active_urls
        .iter()
        .map(String::as_str)
        .filter(|url| !ordinals.contains_key(url))
        .collect();

    let highest = ordinals.values().copied().max().unwrap_or(0);
    let mut next = match highest.checked_add(fresh.len() as u64) {
        Some(_) => highest + 1,
        None => renumber(&mut ordinals) + 1,
    };
    for url in fresh {
        ordinals.insert(url, next);
        next += 1;
    }

    let mut entries: Vec<StackEntry> = ordinals
        .into_iter()
        .map(|(url, ordinal)| StackEntry {
            url: url.to_string(),
            ordinal,
            icon: icon_for(url, &args),
        })
        .collect();
    entries.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));

    let mut lines = Vec::with_capacity(entries.len() + 3);
    let free_body = free_body.trim_end();
    if !free_body.is_empty() {
        lines.push(free_body.to_string());
    }
    lines.push(String::new());
    lines.push(HEADING.to_string());
    lines.extend(entries.iter().map(|entry| entry.to_string().trim_end().to_string()));

    lines.join("\n")
}

/// Reassigns ordinals `1..=n` keeping their relative order; returns `n`.
fn renumber(ordinals: &mut IndexMap<&str, u64>) -> u64 {
    let mut ranked: Vec<(&str, u64)> = ordinals.iter().map(|(url, ord)| (*url, *ord)).collect();
    ranked.sort_by_key(|(_, ordinal)| *ordinal);
    let mut last = 0;
    for (url, _) in ranked {
        last += 1;
        ordinals.insert(url, last);
    }
    last
}

fn icon_for(url: &str, args: &WriteArgs<'_>) -> Icon {
    if url == args.selected_url {
        Icon::Current
    } else if args.active_urls.iter().any(|active| active == url) {
        Icon::Pending
    } else {
        Icon::Done
    }
}
