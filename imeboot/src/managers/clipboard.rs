//! Clipboard history.

use std::collections::VecDeque;
use std::fs;

use parking_lot::Mutex;

use super::LazyStorageDir;
use crate::app::{AppState, BootError, BootResult};

/// Default number of history entries kept.
pub const DEFAULT_CLIPBOARD_CAPACITY: usize = 20;

const CLIPBOARD_DIR: &str = "clipboard";
const HISTORY_FILE: &str = "history.json";

/// In-memory clipboard history, persisted on request.
#[derive(Debug)]
pub struct ClipboardManager {
    capacity: usize,
    history: Mutex<VecDeque<String>>,
    storage: LazyStorageDir,
}

impl ClipboardManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            capacity: DEFAULT_CLIPBOARD_CAPACITY,
            history: Mutex::new(VecDeque::new()),
            storage: LazyStorageDir::new(
                CLIPBOARD_DIR,
                state.platform().clone(),
                state.gate().clone(),
            ),
        }
    }

    /// Add an entry, newest first. Duplicates move to the front.
    pub fn push(&self, text: impl Into<String>) {
        let text = text.into();
        let mut history = self.history.lock();
        history.retain(|entry| entry != &text);
        history.push_front(text);
        history.truncate(self.capacity);
    }

    /// History entries, newest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().iter().cloned().collect()
    }

    /// Write the history to credential-protected storage.
    pub fn persist(&self) -> BootResult<()> {
        let path = self.storage.get()?.join(HISTORY_FILE);
        let json = serde_json::to_vec(&self.history())
            .map_err(|e| BootError::io(&path, e.into()))?;
        fs::write(&path, json).map_err(|e| BootError::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BootConfig;
    use crate::platform::{DirPlatform, Platform};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_history_is_bounded_and_deduplicated() {
        let temp = tempdir().unwrap();
        let config = BootConfig::new(temp.path());
        let platform = Arc::new(DirPlatform::from_config(&config));
        let state = AppState::builder(config, platform).build();
        let clipboard = state.clipboard_manager();

        for i in 0..DEFAULT_CLIPBOARD_CAPACITY + 5 {
            clipboard.push(format!("entry {}", i));
        }
        clipboard.push("entry 10");

        let history = clipboard.history();
        assert_eq!(history.len(), DEFAULT_CLIPBOARD_CAPACITY);
        assert_eq!(history[0], "entry 10");
        assert_eq!(history.iter().filter(|e| *e == "entry 10").count(), 1);
    }

    #[test]
    fn test_persist_waits_for_unlock() {
        let temp = tempdir().unwrap();
        let config = BootConfig::new(temp.path());
        let platform = Arc::new(DirPlatform::from_config(&config).locked());
        let state = AppState::builder(config, platform.clone()).build();
        state.gate().evaluate(platform.as_ref());
        let clipboard = state.clipboard_manager();
        clipboard.push("secret");

        assert!(matches!(clipboard.persist(), Err(BootError::StorageLocked)));

        state.gate().mark_unlocked();
        clipboard.persist().unwrap();
        let saved = fs::read_to_string(
            platform.app_context().files_dir().join("clipboard/history.json"),
        )
        .unwrap();
        assert_eq!(saved, r#"["secret"]"#);
    }
}
