//! imeboot - staged process bootstrap for an input-method application.
//!
//! This library decides in which order the application's subsystems are
//! created at cold start, defers everything that needs credential-protected
//! storage until the user has unlocked the device, and hands the packaged
//! locale data to the native locale library.
//!
//! # Architecture
//!
//! ```text
//! ImeApp::start ──► logging + crash reporter
//!                └─► preference autosave ─► cache sweep ─► StorageGate
//!                      ├── Unlocked: locale data ─► preferences ─► dictionary ─► theme
//!                      └── Locked:   locale data (device storage) ─► UnlockListener (Armed)
//!                                         │
//!                BroadcastBus ── USER_UNLOCKED ──► Fired ─► preferences ─► dictionary ─► theme
//! ```
//!
//! Managers are reached through [`AppState`] accessors and are built lazily on
//! first access, independent of how far bootstrap has progressed.

pub mod app;
pub mod broadcast;
pub mod crash;
pub mod gate;
pub mod listener;
pub mod locale;
pub mod logging;
pub mod managers;
pub mod native;
pub mod platform;
pub mod prefs;
pub mod registry;

pub use app::{
    AppState, AppStateBuilder, BootConfig, BootError, BootPath, BootReport, ImeApp, Stage,
    StageStatus,
};
pub use broadcast::{Broadcast, BroadcastBus, ACTION_USER_UNLOCKED};
pub use gate::{StorageAccess, StorageGate};
pub use listener::{ListenerState, UnlockListener};
pub use locale::LocaleDataLoader;
pub use native::{LocaleDataInitializer, NativeLocaleLibrary};
pub use platform::{DirContext, DirPlatform, Platform, StorageContext, StorageKind};
