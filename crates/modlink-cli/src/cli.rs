//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use modlink_core::ImportMode;

/// modlink - Mirror a mod library into the folder your game scans
#[derive(Parser, Debug)]
#[command(name = "modlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Library directory for this run (overrides the config file)
    #[arg(long, env = "MODLINK_LIBRARY", value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Managed directory for this run (overrides the config file)
    #[arg(long, env = "MODLINK_MANAGED", value_name = "DIR")]
    pub managed: Option<PathBuf>,

    /// Directory holding config and provenance instead of the per-user one
    #[arg(long, env = "MODLINK_STATE_DIR", value_name = "DIR", hide = true)]
    pub state_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Classify every entry of the managed directory
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Link or copy library files into the managed directory
    ///
    /// Examples:
    ///   modlink import ~/mods/sigil/SIGIL.wad
    ///   modlink import --mode copied ~/mods/*.wad
    Import {
        /// Files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// linked or copied (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<ImportMode>,
    },

    /// Delete entries from the managed directory by name
    ///
    /// Only the managed entry is removed; library files are never touched.
    Remove {
        /// Entry names, as shown by 'modlink status'
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Index the library and list what was found
    Index {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Keep watching both directories and print every new classification
    ///
    /// Type 'r' and Enter to force a full rescan, 'q' or end of input to stop.
    Watch,

    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Save settings to the config file
    Set {
        /// Library directory
        #[arg(long, value_name = "DIR")]
        library: Option<PathBuf>,

        /// Managed directory
        #[arg(long, value_name = "DIR")]
        managed: Option<PathBuf>,

        /// Default import mode
        #[arg(long)]
        mode: Option<ImportMode>,
    },
}
