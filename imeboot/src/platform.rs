//! Platform storage abstraction.
//!
//! The bootstrap only needs a handful of facts from the host platform: which
//! storage areas exist, whether the user has unlocked credential-protected
//! storage yet, and how to read packaged assets. `Platform` and
//! `StorageContext` capture exactly that; `DirPlatform` implements them on
//! plain directories.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::app::BootConfig;

/// Storage area a context is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Available only after the user unlocked their credentials since boot.
    CredentialProtected,
    /// Available right after boot, before user unlock.
    DeviceProtected,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::CredentialProtected => f.write_str("credential"),
            StorageKind::DeviceProtected => f.write_str("device"),
        }
    }
}

/// Execution context scoped to one storage area.
pub trait StorageContext: Send + Sync + fmt::Debug {
    /// Storage area this context reads and writes.
    fn kind(&self) -> StorageKind;

    /// Private, persistent files directory.
    fn files_dir(&self) -> &Path;

    /// Private cache directory; contents may be removed at any time.
    fn cache_dir(&self) -> &Path;

    /// Open a packaged asset by logical path (e.g. `icu/icudt66l.dat`).
    fn open_asset(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    /// List the file names inside a packaged asset directory, sorted.
    fn list_assets(&self, dir: &str) -> io::Result<Vec<String>>;
}

/// Host platform facts needed by the storage gate.
pub trait Platform: Send + Sync {
    /// Whether device- and credential-protected storage are separate.
    fn supports_split_storage(&self) -> bool;

    /// Whether the user has unlocked credential storage since boot.
    fn is_user_unlocked(&self) -> bool;

    /// Normal application context (credential-protected storage).
    fn app_context(&self) -> Arc<dyn StorageContext>;

    /// Context usable before user unlock.
    fn device_protected_context(&self) -> Arc<dyn StorageContext>;
}

/// Directory-backed storage context.
#[derive(Debug, Clone)]
pub struct DirContext {
    kind: StorageKind,
    files_dir: PathBuf,
    cache_dir: PathBuf,
    asset_dir: PathBuf,
}

impl DirContext {
    /// Create a context rooted at `root` (`root/files`, `root/cache`).
    pub fn new(kind: StorageKind, root: &Path, asset_dir: &Path) -> Self {
        Self {
            kind,
            files_dir: root.join("files"),
            cache_dir: root.join("cache"),
            asset_dir: asset_dir.to_path_buf(),
        }
    }

    fn resolve_asset(&self, path: &str) -> io::Result<PathBuf> {
        let logical = Path::new(path);
        let safe = !path.is_empty()
            && logical
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset path '{}'", path),
            ));
        }
        Ok(self.asset_dir.join(logical))
    }
}

impl StorageContext for DirContext {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn open_asset(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.resolve_asset(path)?)?;
        Ok(Box::new(file))
    }

    fn list_assets(&self, dir: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.resolve_asset(dir)?)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Directory-backed platform with a switchable unlock state.
pub struct DirPlatform {
    credential: Arc<DirContext>,
    device: Arc<DirContext>,
    split_storage: bool,
    unlocked: AtomicBool,
}

impl DirPlatform {
    /// Create an unlocked platform from the configured storage roots.
    pub fn from_config(config: &BootConfig) -> Self {
        let assets = &config.paths.asset_dir;
        Self {
            credential: Arc::new(DirContext::new(
                StorageKind::CredentialProtected,
                &config.paths.credential_dir,
                assets,
            )),
            device: Arc::new(DirContext::new(
                StorageKind::DeviceProtected,
                &config.paths.device_dir,
                assets,
            )),
            split_storage: config.split_storage,
            unlocked: AtomicBool::new(true),
        }
    }

    /// Start with credential storage locked.
    pub fn locked(self) -> Self {
        self.unlocked.store(false, Ordering::SeqCst);
        self
    }

    /// Record that the user unlocked credential storage.
    pub fn unlock(&self) {
        self.unlocked.store(true, Ordering::SeqCst);
    }
}

impl Platform for DirPlatform {
    fn supports_split_storage(&self) -> bool {
        self.split_storage
    }

    fn is_user_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    fn app_context(&self) -> Arc<dyn StorageContext> {
        self.credential.clone()
    }

    fn device_protected_context(&self) -> Arc<dyn StorageContext> {
        self.device.clone()
    }
}
