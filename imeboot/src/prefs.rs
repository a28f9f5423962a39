//! Preference store.
//!
//! Preferences live in credential-protected storage, so they can only be
//! loaded after the user has unlocked. The store therefore has two phases:
//! the autosave facility is installed at process start, while the actual
//! content is loaded later by `initialize()` from the unlocked context.
//!
//! Keys use `section.key` form and map onto INI sections; keys without a dot
//! go into the general section.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ini::Ini;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{BootError, BootResult};
use crate::platform::StorageContext;

/// Preference storage used by the bootstrap.
pub trait PreferenceStore: Send + Sync {
    /// Start the fire-and-forget periodic save.
    fn install_autosave(&self, interval: Duration) -> BootResult<()>;

    /// Load preferences from `ctx`. Must only be called once storage is
    /// unlocked.
    fn initialize(&self, ctx: &dyn StorageContext) -> BootResult<()>;

    fn is_initialized(&self) -> bool;

    /// Read a value. `None` before initialization.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value. Fails before initialization.
    fn set(&self, key: &str, value: &str) -> BootResult<()>;

    /// Persist pending changes.
    fn save(&self) -> BootResult<()>;

    /// Stop the autosave task.
    fn shutdown(&self);
}

struct Loaded {
    path: PathBuf,
    ini: Ini,
}

struct Inner {
    file_name: String,
    loaded: Mutex<Option<Loaded>>,
    dirty: AtomicBool,
    autosave: Mutex<Option<CancellationToken>>,
}

impl Inner {
    fn save(&self) -> BootResult<()> {
        let guard = self.loaded.lock();
        let loaded = guard
            .as_ref()
            .ok_or_else(|| BootError::Preferences("not initialized".to_string()))?;
        let staging = loaded.path.with_extension("ini.tmp");
        loaded
            .ini
            .write_to_file(&staging)
            .map_err(|e| BootError::io(&staging, e))?;
        fs::rename(&staging, &loaded.path).map_err(|e| BootError::io(&loaded.path, e))?;
        self.dirty.store(false, Ordering::SeqCst);
        debug!(path = %loaded.path.display(), "Preferences saved");
        Ok(())
    }
}

/// INI-file backed preference store.
pub struct IniPreferenceStore {
    inner: Arc<Inner>,
}

impl IniPreferenceStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                file_name: file_name.into(),
                loaded: Mutex::new(None),
                dirty: AtomicBool::new(false),
                autosave: Mutex::new(None),
            }),
        }
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }
}

fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('.') {
        Some((section, name)) => (Some(section), name),
        None => (None, key),
    }
}

impl PreferenceStore for IniPreferenceStore {
    fn install_autosave(&self, interval: Duration) -> BootResult<()> {
        let handle =
            Handle::try_current().map_err(|_| BootError::NoRuntime("preference autosave"))?;
        let mut slot = self.inner.autosave.lock();
        if slot.is_some() {
            debug!("Preference autosave already installed");
            return Ok(());
        }

        let token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let cancelled = token.clone();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if inner.dirty.load(Ordering::SeqCst) {
                            if let Err(e) = inner.save() {
                                warn!(error = %e, "Preference autosave failed");
                            }
                        }
                    }
                }
            }
            debug!("Preference autosave stopped");
        });
        *slot = Some(token);
        info!(interval_secs = interval.as_secs(), "Preference autosave installed");
        Ok(())
    }

    fn initialize(&self, ctx: &dyn StorageContext) -> BootResult<()> {
        let mut loaded = self.inner.loaded.lock();
        if loaded.is_some() {
            debug!("Preferences already initialized");
            return Ok(());
        }

        let dir = ctx.files_dir();
        fs::create_dir_all(dir).map_err(|e| BootError::io(dir, e))?;
        let path = dir.join(&self.inner.file_name);
        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| BootError::Preferences(format!("{}: {}", path.display(), e)))?
        } else {
            Ini::new()
        };

        info!(path = %path.display(), storage = %ctx.kind(), "Preferences initialized");
        *loaded = Some(Loaded { path, ini });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.inner.loaded.lock().is_some()
    }

    fn get(&self, key: &str) -> Option<String> {
        let (section, name) = split_key(key);
        self.inner
            .loaded
            .lock()
            .as_ref()
            .and_then(|l| l.ini.get_from(section, name).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> BootResult<()> {
        let (section, name) = split_key(key);
        let mut guard = self.inner.loaded.lock();
        let loaded = guard
            .as_mut()
            .ok_or_else(|| BootError::Preferences(format!("set '{}' before initialization", key)))?;
        loaded.ini.set_to(section, name.to_string(), value.to_string());
        self.inner.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn save(&self) -> BootResult<()> {
        self.inner.save()
    }

    fn shutdown(&self) {
        if let Some(token) = self.inner.autosave.lock().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DirContext, StorageKind};
    use tempfile::tempdir;

    fn context(root: &std::path::Path) -> DirContext {
        DirContext::new(StorageKind::CredentialProtected, root, root)
    }

    #[test]
    fn test_reads_and_writes_fail_before_initialize() {
        let store = IniPreferenceStore::new("preferences.ini");
        assert!(!store.is_initialized());
        assert!(store.get("theme.day").is_none());
        assert!(matches!(
            store.set("theme.day", "floris"),
            Err(BootError::Preferences(_))
        ));
        assert!(store.save().is_err());
    }

    #[test]
    fn test_values_persist_across_instances() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let store = IniPreferenceStore::new("preferences.ini");
        store.initialize(&ctx).unwrap();
        store.set("theme.day", "floris_day").unwrap();
        store.set("version", "3").unwrap();
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reopened = IniPreferenceStore::new("preferences.ini");
        reopened.initialize(&ctx).unwrap();
        assert_eq!(reopened.get("theme.day").as_deref(), Some("floris_day"));
        assert_eq!(reopened.get("version").as_deref(), Some("3"));
        assert!(!ctx.files_dir().join("preferences.ini.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_preferences_error() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());
        fs::create_dir_all(ctx.files_dir()).unwrap();
        fs::write(ctx.files_dir().join("preferences.ini"), "[unterminated\nkey=").unwrap();

        let store = IniPreferenceStore::new("preferences.ini");
        assert!(matches!(
            store.initialize(&ctx),
            Err(BootError::Preferences(_))
        ));
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_autosave_requires_runtime() {
        let store = IniPreferenceStore::new("preferences.ini");
        assert!(matches!(
            store.install_autosave(Duration::from_secs(1)),
            Err(BootError::NoRuntime(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_dirty_state() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());
        let store = IniPreferenceStore::new("preferences.ini");
        store.install_autosave(Duration::from_secs(30)).unwrap();
        store.initialize(&ctx).unwrap();
        store.set("keyboard.layout", "qwerty").unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(!store.is_dirty());
        let saved = fs::read_to_string(ctx.files_dir().join("preferences.ini")).unwrap();
        assert!(saved.contains("qwerty"));
        store.shutdown();
    }
}
