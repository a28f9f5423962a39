//! Spell-checking manager and service.

use std::io;
use std::sync::Arc;

use super::{AssetManager, ManagerKind};
use crate::app::{AppState, BootError, BootResult};

const SPELLING_ASSET_DIR: &str = "ime/spelling";

/// Knows which spelling dictionaries are packaged.
#[derive(Debug)]
pub struct SpellingManager {
    assets: Arc<AssetManager>,
}

impl SpellingManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            assets: state.asset_manager(),
        }
    }

    /// Locales with a packaged spelling dictionary (`<locale>.dic`).
    pub fn available_locales(&self) -> BootResult<Vec<String>> {
        match self.assets.list(SPELLING_ASSET_DIR) {
            Ok(names) => Ok(names
                .iter()
                .filter_map(|n| n.strip_suffix(".dic").map(str::to_string))
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(BootError::manager(ManagerKind::SpellingManager, e)),
        }
    }
}

/// Answers spell-check requests for the active subtype.
#[derive(Debug)]
pub struct SpellingService {
    manager: Arc<SpellingManager>,
    subtypes: Arc<super::SubtypeManager>,
}

impl SpellingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            manager: state.spelling_manager(),
            subtypes: state.subtype_manager(),
        }
    }

    /// Whether spell checking is possible for the active subtype.
    pub fn is_supported(&self) -> BootResult<bool> {
        let locale = self.subtypes.active().locale;
        Ok(self.manager.available_locales()?.contains(&locale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BootConfig;
    use crate::managers::Subtype;
    use crate::platform::DirPlatform;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_support_follows_packaged_dictionaries() {
        let temp = tempdir().unwrap();
        let config = BootConfig::new(temp.path());
        let spelling_dir = config.paths.asset_dir.join(SPELLING_ASSET_DIR);
        fs::create_dir_all(&spelling_dir).unwrap();
        fs::write(spelling_dir.join("de_DE.dic"), b"").unwrap();
        let platform = Arc::new(DirPlatform::from_config(&config));
        let state = AppState::builder(config, platform).build();

        assert_eq!(state.spelling_manager().available_locales().unwrap(), vec!["de_DE"]);
        assert!(!state.spelling_service().is_supported().unwrap());

        state.subtype_manager().add(Subtype::new("de_DE", "qwertz"));
        state.subtype_manager().switch_to("de_DE").unwrap();
        assert!(state.spelling_service().is_supported().unwrap());
    }
}
