//! Theme manager.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::info;

use super::{list_files_with_extension, AssetManager, ManagerKind};
use crate::app::{AppState, BootError, BootResult};
use crate::platform::StorageContext;
use crate::prefs::PreferenceStore;

/// Asset directory holding the packaged themes.
pub const THEME_ASSET_DIR: &str = "ime/theme";

const USER_THEME_DIR: &str = "themes";
const THEME_EXTENSION: &str = "json";
const ACTIVE_THEME_KEY: &str = "theme.active";

#[derive(Debug)]
struct ThemeIndex {
    packaged: Vec<String>,
    user: Vec<String>,
}

/// Indexes packaged and user themes and tracks the active one.
pub struct ThemeManager {
    preferences: Arc<dyn PreferenceStore>,
    index: OnceLock<ThemeIndex>,
    init_calls: AtomicU32,
}

impl std::fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeManager")
            .field("index", &self.index.get())
            .finish()
    }
}

impl ThemeManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            preferences: state.preferences().clone(),
            index: OnceLock::new(),
            init_calls: AtomicU32::new(0),
        }
    }

    /// Index packaged themes from `assets` and user themes from `ctx`.
    ///
    /// A missing packaged theme directory is not an error.
    pub fn init(&self, ctx: &dyn StorageContext, assets: &AssetManager) -> BootResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.index.get().is_some() {
            return Ok(());
        }
        let packaged = match assets.list(THEME_ASSET_DIR) {
            Ok(names) => names
                .into_iter()
                .filter(|n| n.ends_with(".json"))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(BootError::manager(ManagerKind::Theme, e)),
        };
        let user = list_files_with_extension(&ctx.files_dir().join(USER_THEME_DIR), THEME_EXTENSION)
            .map_err(|e| BootError::manager(ManagerKind::Theme, e))?;

        info!(packaged = packaged.len(), user = user.len(), "Themes indexed");
        let _ = self.index.set(ThemeIndex { packaged, user });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.index.get().is_some()
    }

    /// How many times `init` has been called.
    pub fn init_count(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// All known theme files, packaged first.
    pub fn themes(&self) -> Vec<String> {
        self.index
            .get()
            .map(|i| i.packaged.iter().chain(i.user.iter()).cloned().collect())
            .unwrap_or_default()
    }

    /// The active theme: the stored preference if it names a known theme,
    /// otherwise the first packaged theme.
    pub fn active_theme(&self) -> Option<String> {
        let themes = self.themes();
        self.preferences
            .get(ACTIVE_THEME_KEY)
            .filter(|name| themes.contains(name))
            .or_else(|| themes.first().cloned())
    }

    /// Persist the active theme choice.
    pub fn set_active_theme(&self, name: &str) -> BootResult<()> {
        if !self.themes().iter().any(|t| t == name) {
            return Err(BootError::manager(
                ManagerKind::Theme,
                format!("unknown theme '{}'", name),
            ));
        }
        self.preferences.set(ACTIVE_THEME_KEY, name)
    }
}
