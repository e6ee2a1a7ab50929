//! Command implementations for modlink-cli

pub mod config;
pub mod import;
pub mod index;
pub mod remove;
pub mod status;
pub mod watch;

pub use config::{run_config_set, run_config_show};
pub use import::run_import;
pub use index::run_index;
pub use remove::run_remove;
pub use status::run_status;
pub use watch::run_watch;

use colored::Colorize;
use modlink_core::{Classification, ClassificationSnapshot, ClassifiedEntry, EngineWarning, ProvenanceBasis};

/// Print a snapshot as a table followed by a summary line.
pub(crate) fn print_snapshot(snapshot: &ClassificationSnapshot) {
    println!("{}:  {}", "Managed".dimmed(), snapshot.managed_root.display());
    match &snapshot.library_root {
        Some(library) => println!(
            "{}:  {} ({} files)",
            "Library".dimmed(),
            library.display(),
            snapshot.index_size
        ),
        None => println!("{}:  {}", "Library".dimmed(), "not configured".yellow()),
    }
    println!();

    if snapshot.entries.is_empty() {
        println!("  {}", "No entries".dimmed());
    }
    for entry in &snapshot.entries {
        println!("  {}", describe(entry));
    }

    let (linked, copied, foreign) = snapshot.counts();
    println!();
    println!(
        "{} entries: {} linked, {} copied, {} foreign",
        snapshot.entries.len(),
        linked,
        copied,
        foreign
    );
    print_warnings(&snapshot.warnings);
}

pub(crate) fn print_warnings(warnings: &[EngineWarning]) {
    for warning in warnings {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
}

fn describe(item: &ClassifiedEntry) -> String {
    let name = &item.entry.name;
    match &item.classification {
        Classification::Linked { target, broken } => {
            let target = target
                .as_ref()
                .map(|t| t.display().to_string())
                .unwrap_or_else(|| "?".to_string());
            if *broken {
                format!("{:<8} {} -> {} {}", "linked".red(), name, target, "(broken)".red())
            } else {
                format!("{:<8} {} -> {}", "linked".green(), name, target.dimmed())
            }
        }
        Classification::Copied { source, basis } => {
            let basis = match basis {
                ProvenanceBasis::Recorded => "",
                ProvenanceBasis::Inferred => " inferred",
            };
            format!(
                "{:<8} {} {}",
                "copied".cyan(),
                name,
                format!("(from {}{basis})", source.display()).dimmed()
            )
        }
        Classification::Foreign => format!("{:<8} {}", "foreign".yellow(), name),
    }
}
