//! Extension manager.

use super::{list_files_with_extension, LazyStorageDir, ManagerKind};
use crate::app::{AppState, BootError, BootResult};

const EXTENSION_DIR: &str = "ime/extensions";
const EXTENSION_SUFFIX: &str = "flex";

/// Tracks user-installed extension packages.
#[derive(Debug)]
pub struct ExtensionManager {
    storage: LazyStorageDir,
}

impl ExtensionManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            storage: LazyStorageDir::new(
                EXTENSION_DIR,
                state.platform().clone(),
                state.gate().clone(),
            ),
        }
    }

    /// Installed extension archives. Fails while storage is locked.
    pub fn installed(&self) -> BootResult<Vec<String>> {
        let dir = self.storage.get()?;
        list_files_with_extension(dir, EXTENSION_SUFFIX)
            .map_err(|e| BootError::manager(ManagerKind::Extension, e))
    }
}
