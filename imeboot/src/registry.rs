//! Lazy manager registry.
//!
//! Each manager lives in a [`ManagerCell`], an initialize-once slot that
//! builds the manager on first access and hands out the same `Arc` for the
//! rest of the process. Concurrent first accesses construct exactly once.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::managers::{
    AssetManager, ClipboardManager, DictionaryManager, ExtensionManager, KeyboardManager,
    ManagerKind, SpellingManager, SpellingService, SubtypeManager, ThemeManager,
};

/// A named, lazily-constructed manager instance.
pub struct ManagerCell<T> {
    kind: ManagerKind,
    cell: OnceLock<Arc<T>>,
}

impl<T> ManagerCell<T> {
    pub const fn new(kind: ManagerKind) -> Self {
        Self {
            kind,
            cell: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> ManagerKind {
        self.kind
    }

    /// Return the instance, constructing it with `construct` on first call.
    pub fn get_or_construct(&self, construct: impl FnOnce() -> T) -> Arc<T> {
        Arc::clone(self.cell.get_or_init(|| {
            debug!(manager = %self.kind, "Constructing manager");
            Arc::new(construct())
        }))
    }

    /// The instance, if already constructed.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_constructed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> fmt::Debug for ManagerCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCell")
            .field("kind", &self.kind)
            .field("constructed", &self.is_constructed())
            .finish()
    }
}

/// One cell per manager plus the order in which they were constructed.
#[derive(Debug)]
pub struct ManagerRegistry {
    pub(crate) asset: ManagerCell<AssetManager>,
    pub(crate) clipboard: ManagerCell<ClipboardManager>,
    pub(crate) dictionary: ManagerCell<DictionaryManager>,
    pub(crate) extension: ManagerCell<ExtensionManager>,
    pub(crate) keyboard: ManagerCell<KeyboardManager>,
    pub(crate) spelling_manager: ManagerCell<SpellingManager>,
    pub(crate) spelling_service: ManagerCell<SpellingService>,
    pub(crate) subtype: ManagerCell<SubtypeManager>,
    pub(crate) theme: ManagerCell<ThemeManager>,
    constructed: Mutex<Vec<ManagerKind>>,
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self {
            asset: ManagerCell::new(ManagerKind::Asset),
            clipboard: ManagerCell::new(ManagerKind::Clipboard),
            dictionary: ManagerCell::new(ManagerKind::Dictionary),
            extension: ManagerCell::new(ManagerKind::Extension),
            keyboard: ManagerCell::new(ManagerKind::Keyboard),
            spelling_manager: ManagerCell::new(ManagerKind::SpellingManager),
            spelling_service: ManagerCell::new(ManagerKind::SpellingService),
            subtype: ManagerCell::new(ManagerKind::Subtype),
            theme: ManagerCell::new(ManagerKind::Theme),
            constructed: Mutex::new(Vec::new()),
        }
    }

    /// Construct through `cell`, recording the construction once.
    pub(crate) fn get_or_construct<T>(
        &self,
        cell: &ManagerCell<T>,
        construct: impl FnOnce() -> T,
    ) -> Arc<T> {
        cell.get_or_construct(|| {
            let manager = construct();
            self.constructed.lock().push(cell.kind());
            manager
        })
    }

    /// Managers in the order their construction finished.
    pub fn construction_order(&self) -> Vec<ManagerKind> {
        self.constructed.lock().clone()
    }

    pub fn is_constructed(&self, kind: ManagerKind) -> bool {
        match kind {
            ManagerKind::Asset => self.asset.is_constructed(),
            ManagerKind::Clipboard => self.clipboard.is_constructed(),
            ManagerKind::Dictionary => self.dictionary.is_constructed(),
            ManagerKind::Extension => self.extension.is_constructed(),
            ManagerKind::Keyboard => self.keyboard.is_constructed(),
            ManagerKind::SpellingManager => self.spelling_manager.is_constructed(),
            ManagerKind::SpellingService => self.spelling_service.is_constructed(),
            ManagerKind::Subtype => self.subtype.is_constructed(),
            ManagerKind::Theme => self.theme.is_constructed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_cell_constructs_once() {
        let cell: ManagerCell<String> = ManagerCell::new(ManagerKind::Clipboard);
        assert!(cell.get().is_none());
        let first = cell.get_or_construct(|| "clip".to_string());
        let second = cell.get_or_construct(|| unreachable!("constructed twice"));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cell.is_constructed());
    }

    #[test]
    fn test_concurrent_first_access_constructs_once() {
        let cell: Arc<ManagerCell<usize>> = Arc::new(ManagerCell::new(ManagerKind::Theme));
        let constructions = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let constructions = Arc::clone(&constructions);
                thread::spawn(move || {
                    cell.get_or_construct(|| constructions.fetch_add(1, Ordering::SeqCst))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_registry_records_construction_order() {
        let registry = ManagerRegistry::new();
        let probe: ManagerCell<u8> = ManagerCell::new(ManagerKind::Keyboard);
        registry.get_or_construct(&probe, || 1);
        registry.get_or_construct(&probe, || 2);
        assert_eq!(registry.construction_order(), vec![ManagerKind::Keyboard]);
        assert!(!registry.is_constructed(ManagerKind::Keyboard));
    }
}
