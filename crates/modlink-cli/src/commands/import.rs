//! Import command implementation

use std::path::PathBuf;

use colored::Colorize;
use modlink_core::{ImportAction, ImportMode};

use crate::commands::print_warnings;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Import `paths` in `mode`; fails when any file could not be imported.
pub fn run_import(ctx: &Context, paths: &[PathBuf], mode: ImportMode) -> Result<()> {
    let reconciler = ctx.reconciler();
    let report = reconciler.import(paths, mode)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(success) => {
                let action = match success.action {
                    ImportAction::Created => "created".green(),
                    ImportAction::Refreshed => "unchanged".dimmed(),
                    ImportAction::Replaced => "replaced".cyan(),
                    ImportAction::Renamed => "renamed".yellow(),
                };
                println!(
                    "  {} {} ({}, {})",
                    "+".green(),
                    success.name,
                    success.mode,
                    action
                );
            }
            Err(failure) => {
                println!(
                    "  {} {}: {}",
                    "x".red(),
                    outcome.source.display(),
                    failure
                );
            }
        }
    }
    print_warnings(&report.warnings);

    let failed = report.failed().count();
    if failed > 0 {
        return Err(CliError::user(format!(
            "{failed} of {} imports failed",
            report.outcomes.len()
        )));
    }
    Ok(())
}
