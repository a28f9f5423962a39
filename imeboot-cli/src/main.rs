//! imeboot CLI - drive the input-method cold start from the command line.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;

use commands::boot::BootArgs;
use commands::config::ConfigCommands;

#[derive(Parser)]
#[command(name = "imeboot")]
#[command(version, about = "Staged bootstrap for an input-method application", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cold start and print the per-stage outcome
    Boot(BootArgs),

    /// Check a locale-data file with the built-in native probe
    Probe {
        /// ICU common-data file
        file: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Boot(args) => commands::boot::run(args),
        Commands::Probe { file } => commands::probe::run(&file),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(e.exit_code());
    }
}
