//! Config show/set implementations

use std::path::PathBuf;

use colored::Colorize;
use modlink_core::{EngineConfig, ImportMode};

use crate::context::Context;
use crate::error::{CliError, Result};

/// Print the effective configuration as TOML.
pub fn run_config_show(ctx: &Context) -> Result<()> {
    println!(
        "{} {}",
        "#".dimmed(),
        ctx.paths.config_file().display().to_string().dimmed()
    );
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

/// Write the given settings to the config file, keeping everything else.
///
/// Command-line root overrides are not persisted; only the flags given to
/// `config set` are.
pub fn run_config_set(
    ctx: &Context,
    library: Option<PathBuf>,
    managed: Option<PathBuf>,
    mode: Option<ImportMode>,
) -> Result<()> {
    if library.is_none() && managed.is_none() && mode.is_none() {
        return Err(CliError::user(
            "Nothing to set; pass --library, --managed or --mode",
        ));
    }

    let path = ctx.paths.config_file();
    let mut config = EngineConfig::load(&path)?;
    if let Some(library) = library {
        config.library_root = Some(absolute(library)?);
    }
    if let Some(managed) = managed {
        config.managed_root = absolute(managed)?;
    }
    if let Some(mode) = mode {
        config.default_mode = mode;
    }
    config.save(&path)?;

    println!("{} Saved {}", "OK".green().bold(), path.display());
    Ok(())
}

/// Saved roots must not depend on the directory `config set` ran from.
fn absolute(path: PathBuf) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
