//! modlink CLI
//!
//! Mirrors files from a mod library into a game's mod folder and reports
//! what every entry of that folder is.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.clone() else {
        println!("{} mod folder mirroring", "modlink".green().bold());
        println!();
        println!("Run {} for available commands.", "modlink --help".cyan());
        return Ok(());
    };

    let ctx = Context::load(&cli)?;
    execute_command(&ctx, command)
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug, default warn.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Status { json } => commands::run_status(ctx, json),
        Commands::Import { paths, mode } => {
            commands::run_import(ctx, &paths, mode.unwrap_or(ctx.config.default_mode))
        }
        Commands::Remove { names } => commands::run_remove(ctx, &names),
        Commands::Index { json } => commands::run_index(ctx, json),
        Commands::Watch => commands::run_watch(ctx),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::run_config_show(ctx),
            ConfigAction::Set {
                library,
                managed,
                mode,
            } => commands::run_config_set(ctx, library, managed, mode),
        },
    }
}
