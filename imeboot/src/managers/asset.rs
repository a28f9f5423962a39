//! Packaged asset access.

use std::io;
use std::sync::Arc;

use crate::app::AppState;
use crate::platform::StorageContext;

/// Read-only access to packaged assets.
///
/// Assets ship with the application and are readable before user unlock, so
/// the manager reads through the device-protected context.
#[derive(Debug)]
pub struct AssetManager {
    context: Arc<dyn StorageContext>,
}

impl AssetManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            context: state.platform().device_protected_context(),
        }
    }

    /// List the files in an asset directory, sorted.
    pub fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        self.context.list_assets(dir)
    }
}
