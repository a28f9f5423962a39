//! Application bootstrap implementation.
//!
//! This module contains `ImeApp`, which runs the cold-start sequence and
//! owns the resources that must outlive it (log writer, listener task).

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::{BootError, BootResult};
use super::report::{BootPath, BootReport, Stage};
use super::state::AppState;
use crate::broadcast::Broadcast;
use crate::gate::{self, StorageAccess};
use crate::listener::UnlockListener;
use crate::locale::LocaleDataLoader;
use crate::logging::{self, LoggingGuard};
use crate::platform::StorageContext;

/// Input-method application with an ordered cold start.
///
/// `start` brings subsystems up in this order:
/// 1. Diagnostics and crash reporting (failures are reported, not fatal)
/// 2. Preference autosave, cache sweep and the storage gate
/// 3. Unlocked: locale data, preferences, dictionary, theme
/// 4. Locked: locale data from device storage, then the unlock listener
///
/// Steps 2-4 run inside one failure boundary. An error or panic there is
/// staged to the crash reporter and ends the pass; the application keeps
/// running degraded.
///
/// # Example
///
/// ```ignore
/// let app = ImeApp::start(state);
/// if app.report().path() == Some(BootPath::Deferred) {
///     app.wait_for_unlock().await;
/// }
/// app.shutdown().await;
/// ```
pub struct ImeApp {
    state: Arc<AppState>,

    /// Task feeding notifications to the unlock listener (deferred path).
    listener_task: Mutex<Option<JoinHandle<()>>>,

    /// Keeps the non-blocking log writer alive.
    _logging: Option<LoggingGuard>,
}

impl ImeApp {
    /// Run the cold-start sequence for `state`.
    ///
    /// Call once per process. The preference autosave and the unlock listener
    /// are spawned on the current tokio runtime; without one, those stages
    /// fail and are reported like any other failure.
    pub fn start(state: Arc<AppState>) -> Self {
        let logging = match logging::init_logging(&state.config().logging) {
            Ok(guard) => {
                info!(
                    level = guard.level(),
                    log_dir = ?guard.log_dir(),
                    "Diagnostics initialized"
                );
                state.with_report(|r| r.record_success(Stage::Diagnostics));
                Some(guard)
            }
            Err(e) => {
                logging::warn_fallback(&format!("imeboot: diagnostics unavailable: {}", e));
                state.with_report(|r| r.record_failure(Stage::Diagnostics, &e));
                None
            }
        };

        info!(
            credential_dir = %state.config().paths.credential_dir.display(),
            device_dir = %state.config().paths.device_dir.display(),
            "Starting input-method bootstrap"
        );

        match state.crash_reporter().install() {
            Ok(()) => state.with_report(|r| r.record_success(Stage::CrashReporting)),
            Err(e) => {
                warn!(error = %e, "Crash reporter unavailable");
                state.with_report(|r| r.record_failure(Stage::CrashReporting, &e));
            }
        }

        let mut listener_task = None;
        run_guarded(&state, Stage::Autosave, |current| {
            listener_task = initial_pass(&state, current)?;
            Ok(())
        });

        let report = state.report();
        info!(
            path = ?report.path(),
            aborted_at = ?report.aborted_at(),
            "Bootstrap pass finished"
        );

        Self {
            state,
            listener_task: Mutex::new(listener_task),
            _logging: logging,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Snapshot of the bootstrap outcome.
    pub fn report(&self) -> BootReport {
        self.state.report()
    }

    /// Wait until the unlock listener has fired and its deferred pass has
    /// finished. Returns immediately on the immediate path.
    pub async fn wait_for_unlock(&self) {
        let task = self.listener_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Unlock listener task panicked");
                }
            }
        }
    }

    /// Shut down: stop autosave, save preferences once more and stop a
    /// listener that never fired.
    pub async fn shutdown(self) {
        info!("Shutting down input-method application");

        let preferences = self.state.preferences();
        preferences.shutdown();
        if preferences.is_initialized() {
            if let Err(e) = preferences.save() {
                warn!(error = %e, "Final preference save failed");
            }
        }

        if let Some(task) = self.listener_task.lock().take() {
            task.abort();
            info!("Unlock listener stopped before unlock");
        }

        info!("Shutdown complete");
    }
}

/// Autosave, cache sweep, gate, then one of the two branches.
fn initial_pass(state: &Arc<AppState>, current: &mut Stage) -> BootResult<Option<JoinHandle<()>>> {
    *current = Stage::Autosave;
    match state
        .preferences()
        .install_autosave(state.config().preferences.autosave_interval)
    {
        Ok(()) => state.with_report(|r| r.record_success(Stage::Autosave)),
        Err(e) => {
            warn!(error = %e, "Preference autosave not installed");
            state.with_report(|r| r.record_failure(Stage::Autosave, &e));
        }
    }

    if state.config().sweep_cache {
        *current = Stage::CacheSweep;
        match sweep_caches(state) {
            Ok(removed) => {
                info!(removed, "Cache swept");
                state.with_report(|r| r.record_success(Stage::CacheSweep));
            }
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                state.with_report(|r| r.record_failure(Stage::CacheSweep, &e));
            }
        }
    }

    *current = Stage::StorageGate;
    let access = state.gate().evaluate(state.platform().as_ref());
    state.with_report(|r| {
        r.record_success(Stage::StorageGate);
        r.set_path(match access {
            StorageAccess::Unlocked => BootPath::Immediate,
            StorageAccess::Locked => BootPath::Deferred,
        });
    });

    match access {
        StorageAccess::Unlocked => {
            let ctx = state.platform().app_context();
            *current = Stage::LocaleData;
            load_locale_data(state, ctx.as_ref());
            storage_pass(state, ctx.as_ref(), current)?;
            Ok(None)
        }
        StorageAccess::Locked => {
            let ctx = state.platform().device_protected_context();
            *current = Stage::LocaleData;
            load_locale_data(state, ctx.as_ref());

            *current = Stage::UnlockListener;
            let (listener, receiver) = UnlockListener::arm(state);
            let task = match Arc::clone(&listener).listen(receiver) {
                Ok(task) => task,
                Err(e) => {
                    if let Err(unregister) = state.bus().unregister(listener.id()) {
                        warn!(error = %unregister, "Failed to deregister unlock listener");
                    }
                    return Err(e);
                }
            };
            state.set_listener(Arc::clone(&listener));
            state.with_report(|r| r.record_success(Stage::UnlockListener));
            info!("Storage locked, deferring preference and manager initialization");

            // An unlock between the gate sample and registration was never
            // delivered to the listener.
            if gate::storage_unlocked(state.platform().as_ref()) {
                info!("Storage unlocked while arming, delivering unlock to listener");
                listener.on_receive(&Broadcast::user_unlocked());
            }
            Ok(Some(task))
        }
    }
}

/// Preferences, dictionary, theme. Shared by both paths.
fn storage_pass(state: &AppState, ctx: &dyn StorageContext, current: &mut Stage) -> BootResult<()> {
    *current = Stage::Preferences;
    state.preferences().initialize(ctx)?;
    state.with_report(|r| r.record_success(Stage::Preferences));

    *current = Stage::Dictionary;
    state.dictionary_manager().init(ctx)?;
    state.with_report(|r| r.record_success(Stage::Dictionary));

    *current = Stage::Theme;
    let assets = state.asset_manager();
    state.theme_manager().init(ctx, &assets)?;
    state.with_report(|r| r.record_success(Stage::Theme));

    info!(storage = %ctx.kind(), "Preferences and storage-dependent managers initialized");
    Ok(())
}

/// Locale-data failures degrade locale features and never abort the pass.
fn load_locale_data(state: &AppState, ctx: &dyn StorageContext) {
    let config = &state.config().locale;
    let loader = LocaleDataLoader::new(&config.asset_path, state.native().as_ref())
        .with_slow_threshold(config.slow_native_threshold);
    if loader.load(ctx) {
        state.with_report(|r| r.record_success(Stage::LocaleData));
    } else {
        state.with_report(|r| {
            r.record_failure(Stage::LocaleData, "locale data unavailable, see log")
        });
    }
}

/// Run the deferred pass after the unlock notification.
pub(crate) fn run_deferred_pass(state: &Arc<AppState>) {
    state.gate().mark_unlocked();
    state.with_report(|r| r.record_deferred_pass());
    let ctx = state.platform().app_context();
    run_guarded(state, Stage::Preferences, |current| {
        storage_pass(state, ctx.as_ref(), current)
    });
}

/// Failure boundary: errors and panics from `pass` are staged to the crash
/// reporter and recorded against the stage that was running.
///
/// Returns whether the pass completed.
fn run_guarded<F>(state: &AppState, first: Stage, pass: F) -> bool
where
    F: FnOnce(&mut Stage) -> BootResult<()>,
{
    let mut current = first;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pass(&mut current)));
    let err = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => e,
        Err(payload) => BootError::from_panic(payload.as_ref()),
    };

    error!(stage = %current, error = %err, "Bootstrap pass aborted");
    state.crash_reporter().stage(Some(current), &err);
    state.with_report(|r| {
        r.record_failure(current, &err);
        r.record_abort(current);
    });
    false
}

/// Remove stale cache contents. The credential cache is only touched when
/// that storage is already accessible.
fn sweep_caches(state: &AppState) -> BootResult<usize> {
    let platform = state.platform();
    let mut removed = sweep_dir(platform.device_protected_context().cache_dir())?;
    if gate::storage_unlocked(platform.as_ref()) {
        removed += sweep_dir(platform.app_context().cache_dir())?;
    }
    Ok(removed)
}

fn sweep_dir(dir: &Path) -> BootResult<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BootError::io(dir, e)),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| BootError::io(dir, e))?.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| BootError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}
