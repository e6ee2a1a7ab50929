//! Remove command implementation

use colored::Colorize;
use modlink_core::RemovalAction;

use crate::commands::print_warnings;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Remove managed entries by name; fails when any removal failed.
pub fn run_remove(ctx: &Context, names: &[String]) -> Result<()> {
    let reconciler = ctx.reconciler();
    let report = reconciler.remove(names)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(RemovalAction::Removed) => println!("  {} {}", "-".red(), outcome.name),
            Ok(RemovalAction::NotFound) => {
                println!("    {} {}", outcome.name, "(not found)".dimmed())
            }
            Err(failure) => println!("  {} {}", "x".red(), failure),
        }
    }
    print_warnings(&report.warnings);

    let failed = report.failed().count();
    if failed > 0 {
        return Err(CliError::user(format!(
            "{failed} of {} removals failed",
            report.outcomes.len()
        )));
    }
    Ok(())
}
