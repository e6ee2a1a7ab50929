//! Watch command implementation

use std::io::BufRead;
use std::sync::Arc;

use colored::Colorize;
use modlink_core::{ClassificationSnapshot, Engine, EngineOptions};
use parking_lot::Mutex;
use tracing::debug;

use crate::commands::print_snapshot;
use crate::context::Context;
use crate::error::Result;

/// Run the engine with filesystem watching and print each new snapshot
/// until `q` or end of input.
pub fn run_watch(ctx: &Context) -> Result<()> {
    let engine = Engine::start(
        ctx.reconciler(),
        EngineOptions {
            watch: true,
            debounce: ctx.config.debounce(),
        },
    )?;

    let printed = Arc::new(Mutex::new(0u64));
    {
        let printed = Arc::clone(&printed);
        engine.subscribe(move |snapshot| show(&printed, &snapshot));
    }
    let current = engine.current_classification();
    if current.generation > 0 {
        show(&printed, &current);
    }

    println!(
        "{} {} to rescan, {} to quit",
        "Watching.".bold(),
        "r".cyan(),
        "q".cyan()
    );
    for line in std::io::stdin().lock().lines() {
        match line?.trim() {
            "q" | "quit" => break,
            "r" | "rescan" => engine.request_rescan(true)?,
            "" => {}
            other => println!("Unknown input {}", other.yellow()),
        }
    }

    debug!("stopping watch");
    engine.shutdown()?;
    Ok(())
}

/// Print `snapshot` unless one at least as new was already printed.
/// The lock is held while printing so snapshots never interleave.
fn show(printed: &Mutex<u64>, snapshot: &ClassificationSnapshot) {
    let mut last = printed.lock();
    if !advance(&mut last, snapshot.generation) {
        return;
    }
    println!();
    println!("{} #{}", "Classification".bold(), snapshot.generation);
    print_snapshot(snapshot);
}

/// Move `last` forward to `generation`; false if it is not newer.
fn advance(last: &mut u64, generation: u64) -> bool {
    if generation <= *last {
        return false;
    }
    *last = generation;
    true
}
