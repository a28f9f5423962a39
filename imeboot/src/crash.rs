//! Crash reporting.
//!
//! Bootstrap failures are never propagated to the caller; they are staged
//! here so the next launch (or a support bundle) can pick them up.

use std::collections::VecDeque;
use std::error::Error as _;
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::{BootError, BootResult, CrashConfig, Stage};

static PANIC_HOOK: OnceLock<()> = OnceLock::new();

/// Staged crashes kept in memory; older ones remain only on disk.
pub const MAX_STAGED_IN_MEMORY: usize = 64;

/// A failure recorded by the crash reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedCrash {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Bootstrap stage that failed, if the failure came from bootstrap.
    pub stage: Option<Stage>,
    pub message: String,
    /// `source()` chain of the error, outermost first.
    pub causes: Vec<String>,
}

impl StagedCrash {
    fn from_error(stage: Option<Stage>, err: &BootError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            message: err.to_string(),
            causes,
        }
    }
}

/// Crash reporting facility.
pub trait CrashReporter: Send + Sync {
    /// Prepare the reporter. Failure must not stop the rest of bootstrap.
    fn install(&self) -> BootResult<()>;

    /// Record a failure.
    fn stage(&self, stage: Option<Stage>, err: &BootError);

    /// Failures recorded so far, oldest first. Implementations may keep
    /// only the most recent ones.
    fn staged(&self) -> Vec<StagedCrash>;
}

#[derive(Debug)]
struct Sink {
    directory: Option<PathBuf>,
    staged: Mutex<VecDeque<StagedCrash>>,
    written: AtomicU64,
}

impl Sink {
    fn record(&self, crash: StagedCrash) {
        if let Some(dir) = &self.directory {
            let n = self.written.fetch_add(1, Ordering::Relaxed);
            let name = format!("crash-{}-{}.json", Utc::now().format("%Y%m%dT%H%M%S"), n);
            if let Err(e) = write_report(&dir.join(&name), &crash) {
                warn!(file = %name, error = %e, "Failed to write crash report");
            }
        }
        let mut staged = self.staged.lock();
        if staged.len() == MAX_STAGED_IN_MEMORY {
            staged.pop_front();
        }
        staged.push_back(crash);
    }
}

fn write_report(path: &Path, crash: &StagedCrash) -> BootResult<()> {
    let json = serde_json::to_vec_pretty(crash)
        .map_err(|e| BootError::CrashReporter(e.to_string()))?;
    fs::write(path, json).map_err(|e| BootError::io(path, e))
}

/// Default crash reporter: keeps staged crashes in memory and, when
/// configured, writes each one as a JSON file.
#[derive(Debug)]
pub struct CrashLog {
    sink: Arc<Sink>,
    panic_hook: bool,
}

impl CrashLog {
    pub fn new(config: &CrashConfig) -> Self {
        Self {
            sink: Arc::new(Sink {
                directory: config.directory.clone(),
                staged: Mutex::new(VecDeque::new()),
                written: AtomicU64::new(0),
            }),
            panic_hook: config.panic_hook,
        }
    }

    /// A reporter that only keeps crashes in memory.
    pub fn in_memory() -> Self {
        Self::new(&CrashConfig::default())
    }

    fn install_panic_hook(&self) {
        let sink = Arc::clone(&self.sink);
        PANIC_HOOK.get_or_init(move || {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}", l.file(), l.line()))
                    .unwrap_or_else(|| "unknown".to_string());
                error!(location = %location, "Uncaught panic");
                sink.record(StagedCrash {
                    timestamp: Utc::now().to_rfc3339(),
                    stage: None,
                    message: info.to_string(),
                    causes: vec![location],
                });
                previous(info);
            }));
        });
    }
}

impl CrashReporter for CrashLog {
    fn install(&self) -> BootResult<()> {
        if let Some(dir) = &self.sink.directory {
            fs::create_dir_all(dir).map_err(|e| BootError::io(dir, e))?;
        }
        if self.panic_hook {
            self.install_panic_hook();
        }
        info!(
            directory = ?self.sink.directory,
            panic_hook = self.panic_hook,
            "Crash reporter installed"
        );
        Ok(())
    }

    fn stage(&self, stage: Option<Stage>, err: &BootError) {
        error!(stage = ?stage, error = %err, "Staging crash report");
        self.sink.record(StagedCrash::from_error(stage, err));
    }

    fn staged(&self) -> Vec<StagedCrash> {
        self.sink.staged.lock().iter().cloned().collect()
    }
}
