//! The long-lived application state.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::BootConfig;
use super::report::BootReport;
use crate::broadcast::BroadcastBus;
use crate::crash::{CrashLog, CrashReporter};
use crate::gate::StorageGate;
use crate::listener::UnlockListener;
use crate::managers::{
    AssetManager, ClipboardManager, DictionaryManager, ExtensionManager, KeyboardManager,
    SpellingManager, SpellingService, SubtypeManager, ThemeManager,
};
use crate::native::{LocaleDataInitializer, NativeLocaleLibrary};
use crate::platform::Platform;
use crate::prefs::{IniPreferenceStore, PreferenceStore};
use crate::registry::ManagerRegistry;

/// Everything the application keeps for its whole lifetime.
///
/// Built once with [`AppState::builder`] and shared as `Arc<AppState>`.
/// Managers are constructed on first access through the typed accessors and
/// receive `&AppState` as their only construction context.
pub struct AppState {
    config: BootConfig,
    platform: Arc<dyn Platform>,
    gate: Arc<StorageGate>,
    preferences: Arc<dyn PreferenceStore>,
    crash: Arc<dyn CrashReporter>,
    native: Arc<dyn LocaleDataInitializer>,
    bus: Arc<BroadcastBus>,
    registry: ManagerRegistry,
    report: Mutex<BootReport>,
    listener: Mutex<Option<Arc<UnlockListener>>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn builder(config: BootConfig, platform: Arc<dyn Platform>) -> AppStateBuilder {
        AppStateBuilder {
            config,
            platform,
            preferences: None,
            crash: None,
            native: None,
            bus: None,
        }
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn gate(&self) -> &Arc<StorageGate> {
        &self.gate
    }

    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.preferences
    }

    pub fn crash_reporter(&self) -> &Arc<dyn CrashReporter> {
        &self.crash
    }

    pub fn native(&self) -> &Arc<dyn LocaleDataInitializer> {
        &self.native
    }

    /// Bus the host delivers lifecycle broadcasts on.
    pub fn bus(&self) -> &Arc<BroadcastBus> {
        &self.bus
    }

    pub fn registry(&self) -> &ManagerRegistry {
        &self.registry
    }

    /// Snapshot of the bootstrap outcome so far.
    pub fn report(&self) -> BootReport {
        self.report.lock().clone()
    }

    pub(crate) fn with_report<R>(&self, f: impl FnOnce(&mut BootReport) -> R) -> R {
        f(&mut self.report.lock())
    }

    /// The unlock listener, if the deferred path armed one.
    pub fn listener(&self) -> Option<Arc<UnlockListener>> {
        self.listener.lock().clone()
    }

    pub(crate) fn set_listener(&self, listener: Arc<UnlockListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn asset_manager(&self) -> Arc<AssetManager> {
        self.registry
            .get_or_construct(&self.registry.asset, || AssetManager::new(self))
    }

    pub fn clipboard_manager(&self) -> Arc<ClipboardManager> {
        self.registry
            .get_or_construct(&self.registry.clipboard, || ClipboardManager::new(self))
    }

    pub fn dictionary_manager(&self) -> Arc<DictionaryManager> {
        self.registry
            .get_or_construct(&self.registry.dictionary, || DictionaryManager::new(self))
    }

    pub fn extension_manager(&self) -> Arc<ExtensionManager> {
        self.registry
            .get_or_construct(&self.registry.extension, || ExtensionManager::new(self))
    }

    pub fn keyboard_manager(&self) -> Arc<KeyboardManager> {
        self.registry
            .get_or_construct(&self.registry.keyboard, || KeyboardManager::new(self))
    }

    pub fn spelling_manager(&self) -> Arc<SpellingManager> {
        self.registry
            .get_or_construct(&self.registry.spelling_manager, || {
                SpellingManager::new(self)
            })
    }

    pub fn spelling_service(&self) -> Arc<SpellingService> {
        self.registry
            .get_or_construct(&self.registry.spelling_service, || {
                SpellingService::new(self)
            })
    }

    pub fn subtype_manager(&self) -> Arc<SubtypeManager> {
        self.registry
            .get_or_construct(&self.registry.subtype, || SubtypeManager::new(self))
    }

    pub fn theme_manager(&self) -> Arc<ThemeManager> {
        self.registry
            .get_or_construct(&self.registry.theme, || ThemeManager::new(self))
    }
}

/// Builder for [`AppState`]. Collaborators not supplied fall back to the
/// defaults derived from the configuration.
pub struct AppStateBuilder {
    config: BootConfig,
    platform: Arc<dyn Platform>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    crash: Option<Arc<dyn CrashReporter>>,
    native: Option<Arc<dyn LocaleDataInitializer>>,
    bus: Option<Arc<BroadcastBus>>,
}

impl AppStateBuilder {
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_crash_reporter(mut self, crash: Arc<dyn CrashReporter>) -> Self {
        self.crash = Some(crash);
        self
    }

    pub fn with_native(mut self, native: Arc<dyn LocaleDataInitializer>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn with_bus(mut self, bus: Arc<BroadcastBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Arc<AppState> {
        let config = self.config;
        let preferences = self.preferences.unwrap_or_else(|| {
            Arc::new(IniPreferenceStore::new(config.preferences.file_name.clone()))
        });
        let crash = self
            .crash
            .unwrap_or_else(|| Arc::new(CrashLog::new(&config.crash)));
        let native = self.native.unwrap_or_else(|| match &config.native.library {
            Some(library) => Arc::new(NativeLocaleLibrary::load(library, &config.native.symbol)),
            None => Arc::new(NativeLocaleLibrary::builtin()),
        });

        Arc::new(AppState {
            platform: self.platform,
            gate: Arc::new(StorageGate::new()),
            preferences,
            crash,
            native,
            bus: self.bus.unwrap_or_default(),
            registry: ManagerRegistry::new(),
            report: Mutex::new(BootReport::new()),
            listener: Mutex::new(None),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::ManagerKind;
    use crate::platform::DirPlatform;
    use tempfile::tempdir;

    fn state(root: &std::path::Path) -> Arc<AppState> {
        let config = BootConfig::new(root);
        let platform = Arc::new(DirPlatform::from_config(&config));
        AppState::builder(config, platform).build()
    }

    #[test]
    fn test_accessors_return_same_instance() {
        let temp = tempdir().unwrap();
        let state = state(temp.path());

        assert!(Arc::ptr_eq(&state.asset_manager(), &state.asset_manager()));
        assert!(Arc::ptr_eq(&state.clipboard_manager(), &state.clipboard_manager()));
        assert!(Arc::ptr_eq(&state.dictionary_manager(), &state.dictionary_manager()));
        assert!(Arc::ptr_eq(&state.extension_manager(), &state.extension_manager()));
        assert!(Arc::ptr_eq(&state.keyboard_manager(), &state.keyboard_manager()));
        assert!(Arc::ptr_eq(&state.spelling_manager(), &state.spelling_manager()));
        assert!(Arc::ptr_eq(&state.spelling_service(), &state.spelling_service()));
        assert!(Arc::ptr_eq(&state.subtype_manager(), &state.subtype_manager()));
        assert!(Arc::ptr_eq(&state.theme_manager(), &state.theme_manager()));
        assert_eq!(state.registry().construction_order().len(), ManagerKind::ALL.len());
    }

    #[test]
    fn test_dependencies_constructed_on_demand() {
        let temp = tempdir().unwrap();
        let state = state(temp.path());

        let _ = state.spelling_service();
        assert_eq!(
            state.registry().construction_order(),
            vec![
                ManagerKind::Asset,
                ManagerKind::SpellingManager,
                ManagerKind::Subtype,
                ManagerKind::SpellingService
            ]
        );
        assert!(!state.registry().is_constructed(ManagerKind::Theme));
    }

    #[test]
    fn test_construction_does_not_touch_credential_storage() {
        let temp = tempdir().unwrap();
        let config = BootConfig::new(temp.path());
        let platform = Arc::new(DirPlatform::from_config(&config).locked());
        let state = AppState::builder(config, platform).build();

        let _ = state.dictionary_manager();
        let _ = state.extension_manager();
        let _ = state.clipboard_manager();
        assert!(!temp.path().join("credential").exists());
    }

    #[test]
    fn test_default_native_is_builtin() {
        let temp = tempdir().unwrap();
        assert!(state(temp.path()).native().is_available());
    }
}
