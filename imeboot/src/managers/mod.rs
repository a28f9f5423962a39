//! Application managers.
//!
//! Every manager is constructed lazily from `&AppState` the first time it is
//! requested (see [`crate::registry`]). Constructors never touch
//! credential-protected storage: managers that keep user data resolve their
//! directory through a [`LazyStorageDir`] on first real use, which fails with
//! `StorageLocked` until the storage gate has opened.
//!
//! The dictionary and theme managers also take part in bootstrap through an
//! explicit `init` step, run after the preference store has
//! been initialized.

mod asset;
mod clipboard;
mod dictionary;
mod extension;
mod keyboard;
mod spelling;
mod theme;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::debug;

use crate::app::{BootError, BootResult};
use crate::gate::StorageGate;
use crate::platform::Platform;

pub use asset::AssetManager;
pub use clipboard::{ClipboardManager, DEFAULT_CLIPBOARD_CAPACITY};
pub use dictionary::DictionaryManager;
pub use extension::ExtensionManager;
pub use keyboard::{KeyboardManager, Subtype, SubtypeManager};
pub use spelling::{SpellingManager, SpellingService};
pub use theme::{ThemeManager, THEME_ASSET_DIR};

/// The managers held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerKind {
    Asset,
    Clipboard,
    Dictionary,
    Extension,
    Keyboard,
    SpellingManager,
    SpellingService,
    Subtype,
    Theme,
}

impl ManagerKind {
    pub const ALL: [ManagerKind; 9] = [
        ManagerKind::Asset,
        ManagerKind::Clipboard,
        ManagerKind::Dictionary,
        ManagerKind::Extension,
        ManagerKind::Keyboard,
        ManagerKind::SpellingManager,
        ManagerKind::SpellingService,
        ManagerKind::Subtype,
        ManagerKind::Theme,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ManagerKind::Asset => "asset",
            ManagerKind::Clipboard => "clipboard",
            ManagerKind::Dictionary => "dictionary",
            ManagerKind::Extension => "extension",
            ManagerKind::Keyboard => "keyboard",
            ManagerKind::SpellingManager => "spelling_manager",
            ManagerKind::SpellingService => "spelling_service",
            ManagerKind::Subtype => "subtype",
            ManagerKind::Theme => "theme",
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A directory inside credential-protected storage, resolved on first use.
///
/// Resolution fails with [`BootError::StorageLocked`] while the storage gate
/// is closed. The first successful resolution creates the directory and is
/// cached for the process lifetime.
pub struct LazyStorageDir {
    subdir: &'static str,
    platform: Arc<dyn Platform>,
    gate: Arc<StorageGate>,
    resolved: OnceLock<PathBuf>,
}

impl fmt::Debug for LazyStorageDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStorageDir")
            .field("subdir", &self.subdir)
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

impl LazyStorageDir {
    pub fn new(subdir: &'static str, platform: Arc<dyn Platform>, gate: Arc<StorageGate>) -> Self {
        Self {
            subdir,
            platform,
            gate,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve (and create) the directory.
    pub fn get(&self) -> BootResult<&Path> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.as_path());
        }
        if !self.gate.is_unlocked() {
            return Err(BootError::StorageLocked);
        }
        let path = self.platform.app_context().files_dir().join(self.subdir);
        fs::create_dir_all(&path).map_err(|e| BootError::io(&path, e))?;
        debug!(dir = %path.display(), "Storage directory resolved");
        Ok(self.resolved.get_or_init(|| path).as_path())
    }

    /// Whether the directory has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

/// Sorted names of regular files in `dir` with the given extension.
/// A missing directory yields an empty list.
pub(crate) fn list_files_with_extension(dir: &Path, extension: &str) -> std::io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(extension)
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BootConfig;
    use crate::platform::DirPlatform;
    use tempfile::tempdir;

    #[test]
    fn test_manager_names_are_unique() {
        let mut names: Vec<_> = ManagerKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ManagerKind::ALL.len());
        assert_eq!(ManagerKind::SpellingService.to_string(), "spelling_service");
    }

    #[test]
    fn test_lazy_dir_locked_until_gate_opens() {
        let temp = tempdir().unwrap();
        let config = BootConfig::new(temp.path());
        let platform: Arc<dyn Platform> = Arc::new(DirPlatform::from_config(&config).locked());
        let gate = Arc::new(StorageGate::new());
        gate.evaluate(platform.as_ref());

        let dir = LazyStorageDir::new("dictionaries", platform, Arc::clone(&gate));
        assert!(matches!(dir.get(), Err(BootError::StorageLocked)));
        assert!(!dir.is_resolved());

        gate.mark_unlocked();
        let path = dir.get().unwrap().to_path_buf();
        assert!(path.is_dir());
        assert!(path.ends_with("credential/files/dictionaries"));
        assert!(dir.is_resolved());
    }

    #[test]
    fn test_list_files_filters_extension() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.dict"), b"").unwrap();
        fs::write(temp.path().join("a.dict"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        assert_eq!(
            list_files_with_extension(temp.path(), "dict").unwrap(),
            vec!["a.dict", "b.dict"]
        );
        assert!(list_files_with_extension(&temp.path().join("missing"), "dict")
            .unwrap()
            .is_empty());
    }
}
