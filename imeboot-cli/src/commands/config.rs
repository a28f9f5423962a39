//! Configuration CLI commands.

use std::path::PathBuf;

use clap::Subcommand;

use super::resolve_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Configuration file (INI)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data root; overrides the storage paths from the configuration
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config, root } => {
            let config = resolve_config(config.as_deref(), root)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
    }
}
