//! Application state and bootstrap lifecycle.
//!
//! This module provides `ImeApp`, which runs the cold-start sequence exactly
//! once per process, and `AppState`, the single long-lived object that owns
//! every manager and the bootstrap status.
//!
//! # Problem Solved
//!
//! The order between storage-unlock detection, preference initialization and
//! dependent manager construction matters at every cold start. Reading
//! preferences before the credential-protected storage is available corrupts
//! them; constructing the dictionary before the preferences exist crashes it.
//! `ImeApp` owns that order in a single, testable location:
//!
//! 1. Diagnostics and crash reporting come up first
//! 2. The storage gate picks the immediate or the deferred path
//! 3. The deferred path is completed by the unlock listener, once
//!
//! # Example
//!
//! ```ignore
//! use imeboot::{AppState, BootConfig, DirPlatform, ImeApp};
//!
//! let config = BootConfig::new(root);
//! let platform = Arc::new(DirPlatform::from_config(&config));
//! let state = AppState::builder(config, platform).build();
//!
//! let app = ImeApp::start(state);
//! let dictionary = app.state().dictionary_manager();
//!
//! app.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;
mod report;
mod state;

pub use bootstrap::ImeApp;
pub(crate) use bootstrap::run_deferred_pass;
pub use config::{
    BootConfig, CrashConfig, LocaleConfig, LoggingConfig, NativeConfig, PathsConfig,
    PreferencesConfig, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_LOCALE_ASSET, DEFAULT_NATIVE_SYMBOL,
};
pub use error::{BootError, BootResult};
pub use report::{BootPath, BootReport, Stage, StageStatus};
pub use state::{AppState, AppStateBuilder};
