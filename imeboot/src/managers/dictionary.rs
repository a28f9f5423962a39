//! User dictionary manager.

use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use tracing::info;

use super::{list_files_with_extension, LazyStorageDir, ManagerKind};
use crate::app::{AppState, BootError, BootResult};
use crate::platform::StorageContext;

const DICTIONARY_DIR: &str = "dictionaries";
const DICTIONARY_EXTENSION: &str = "dict";

/// Manages the user dictionaries stored in credential-protected storage.
#[derive(Debug)]
pub struct DictionaryManager {
    storage: LazyStorageDir,
    dictionaries: OnceLock<Vec<String>>,
    init_calls: AtomicU32,
}

impl DictionaryManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            storage: LazyStorageDir::new(
                DICTIONARY_DIR,
                state.platform().clone(),
                state.gate().clone(),
            ),
            dictionaries: OnceLock::new(),
            init_calls: AtomicU32::new(0),
        }
    }

    /// Index the user dictionaries found under `ctx`.
    ///
    /// Only the first call indexes; later calls are no-ops.
    pub fn init(&self, ctx: &dyn StorageContext) -> BootResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.dictionaries.get().is_some() {
            return Ok(());
        }
        let dir = ctx.files_dir().join(DICTIONARY_DIR);
        fs::create_dir_all(&dir).map_err(|e| BootError::io(&dir, e))?;
        let found = list_files_with_extension(&dir, DICTIONARY_EXTENSION)
            .map_err(|e| BootError::manager(ManagerKind::Dictionary, e))?;
        info!(count = found.len(), dir = %dir.display(), "User dictionaries indexed");
        let _ = self.dictionaries.set(found);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.dictionaries.get().is_some()
    }

    /// How many times `init` has been called.
    pub fn init_count(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Names of the indexed user dictionaries.
    pub fn dictionaries(&self) -> BootResult<&[String]> {
        self.dictionaries
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| BootError::manager(ManagerKind::Dictionary, "not initialized"))
    }

    /// Store a user dictionary.
    pub fn import(&self, name: &str, content: &[u8]) -> BootResult<()> {
        let dir = self.storage.get()?;
        let path = dir.join(format!("{}.{}", name, DICTIONARY_EXTENSION));
        fs::write(&path, content).map_err(|e| BootError::io(&path, e))
    }
}
