//! Boot command - run a cold start and print the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use imeboot::{
    AppState, BootPath, BootReport, Broadcast, DirPlatform, ImeApp, Stage, StageStatus,
};

use super::resolve_config;
use crate::error::CliError;

/// Arguments for `imeboot boot`.
#[derive(Debug, Args)]
pub struct BootArgs {
    /// Configuration file (INI)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data root; overrides the storage paths from the configuration
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Start with credential-protected storage locked
    #[arg(long)]
    pub locked: bool,

    /// Deliver the unlock notification after this many seconds
    #[arg(long, value_name = "SECS", requires = "locked")]
    pub unlock_after: Option<u64>,

    /// Treat device and credential storage as one
    #[arg(long)]
    pub no_split_storage: bool,
}

/// Run the boot command.
pub fn run(args: BootArgs) -> Result<(), CliError> {
    let unlock_after = args.unlock_after;
    let mut config = resolve_config(args.config.as_deref(), args.root)?;
    if args.no_split_storage {
        config = config.with_split_storage(false);
    }

    let platform = DirPlatform::from_config(&config);
    let platform = Arc::new(if args.locked { platform.locked() } else { platform });
    let state = AppState::builder(config, platform.clone()).build();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let report = runtime.block_on(async move {
        let app = ImeApp::start(Arc::clone(&state));

        if let (Some(BootPath::Deferred), Some(secs)) = (app.report().path(), unlock_after) {
            println!("Storage locked, unlocking in {}s...", secs);
            tokio::time::sleep(Duration::from_secs(secs)).await;
            platform.unlock();
            let delivered = state.bus().send(&Broadcast::user_unlocked());
            tracing::info!(delivered, "Unlock notification sent");
            app.wait_for_unlock().await;
        }

        let report = app.report();
        app.shutdown().await;
        report
    });

    print_report(&report);

    match report.aborted_at() {
        Some(stage) => Err(CliError::Boot(format!("pass aborted at {}", stage))),
        None => Ok(()),
    }
}

fn print_report(report: &BootReport) {
    let path = match report.path() {
        Some(BootPath::Immediate) => "immediate",
        Some(BootPath::Deferred) => "deferred",
        None => "undecided",
    };
    println!();
    println!("Boot path: {}", style(path).bold());
    for stage in Stage::ALL {
        let status = match report.status(stage) {
            StageStatus::NotRun => style("not run".to_string()).dim(),
            StageStatus::Succeeded => style("ok".to_string()).green(),
            StageStatus::Failed(cause) => style(format!("failed: {}", cause)).red(),
        };
        println!("  {:<16} {}", stage.name(), status);
    }
    if report.deferred_passes() > 0 {
        println!("Deferred passes: {}", report.deferred_passes());
    }
    if report.is_fully_initialized() {
        println!("{}", style("Fully initialized").green().bold());
    } else if report.path() == Some(BootPath::Deferred) && report.deferred_passes() == 0 {
        println!("{}", style("Waiting for user unlock").yellow());
    }
}
