//! Status command implementation

use crate::commands::print_snapshot;
use crate::context::Context;
use crate::error::Result;

/// Run one reconciliation pass and print the classification.
pub fn run_status(ctx: &Context, json: bool) -> Result<()> {
    let reconciler = ctx.reconciler();
    let snapshot = reconciler.reconcile(true, false)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}
