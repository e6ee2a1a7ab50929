//! Index command implementation

use colored::Colorize;
use modlink_core::LibraryEntry;

use crate::context::Context;
use crate::error::Result;

/// Index the library and list its files sorted by path.
pub fn run_index(ctx: &Context, json: bool) -> Result<()> {
    let reconciler = ctx.reconciler();
    let index = reconciler.rebuild_index(false)?;

    let mut entries: Vec<&LibraryEntry> = index.entries().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "  {}  {:>10}  {}",
            short_fingerprint(&entry.fingerprint).dimmed(),
            entry.size,
            entry.path.display()
        );
    }
    println!();
    println!(
        "{} files, {} distinct contents",
        index.len(),
        index.distinct_contents()
    );
    Ok(())
}

/// `sha256:` prefix dropped, first 12 hex digits kept
fn short_fingerprint(fingerprint: &str) -> &str {
    let hex = fingerprint
        .split_once(':')
        .map(|(_, hex)| hex)
        .unwrap_or(fingerprint);
    hex.get(..12).unwrap_or(hex)
}
