//! Per-run state: where state lives and the effective configuration

use std::path::PathBuf;

use modlink_core::{EngineConfig, Reconciler, StatePaths};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::error::Result;

/// State paths plus the config file with command-line overrides applied
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: StatePaths,
    pub config: EngineConfig,
}

impl Context {
    /// Resolve state paths, migrate legacy state once, load the config and
    /// apply `--library` / `--managed`.
    pub fn load(cli: &Cli) -> Result<Self> {
        let paths = match &cli.state_dir {
            Some(dir) => StatePaths::at(dir),
            None => StatePaths::resolve(),
        };
        for migrated in paths.migrate_legacy() {
            info!(path = %migrated.display(), "migrated legacy state");
        }

        let mut config = EngineConfig::load(&paths.config_file())?;
        apply_overrides(&mut config, cli.library.clone(), cli.managed.clone());
        debug!(
            state_dir = %paths.state_dir().display(),
            library = ?config.library_root,
            managed = %config.managed_root.display(),
            "context loaded"
        );
        Ok(Self { paths, config })
    }

    /// A reconciler over the effective roots and the per-user store
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(&self.config, self.paths.store_file())
    }
}

fn apply_overrides(config: &mut EngineConfig, library: Option<PathBuf>, managed: Option<PathBuf>) {
    if library.is_some() {
        config.library_root = library;
    }
    if let Some(managed) = managed {
        config.managed_root = managed;
    }
}
