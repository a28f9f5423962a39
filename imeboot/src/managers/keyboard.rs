//! Keyboard and subtype managers.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::ManagerKind;
use crate::app::{AppState, BootError, BootResult};

/// A language/layout pair the keyboard can switch between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtype {
    pub locale: String,
    pub layout: String,
}

impl Subtype {
    pub fn new(locale: impl Into<String>, layout: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            layout: layout.into(),
        }
    }
}

#[derive(Debug)]
struct Subtypes {
    all: Vec<Subtype>,
    active: usize,
}

/// Configured subtypes and the active selection.
#[derive(Debug)]
pub struct SubtypeManager {
    subtypes: RwLock<Subtypes>,
}

impl SubtypeManager {
    pub fn new(_state: &AppState) -> Self {
        Self {
            subtypes: RwLock::new(Subtypes {
                all: vec![Subtype::new("en_US", "qwerty")],
                active: 0,
            }),
        }
    }

    pub fn subtypes(&self) -> Vec<Subtype> {
        self.subtypes.read().all.clone()
    }

    pub fn active(&self) -> Subtype {
        let subtypes = self.subtypes.read();
        subtypes.all[subtypes.active].clone()
    }

    /// Add a subtype; adding an existing one is a no-op.
    pub fn add(&self, subtype: Subtype) {
        let mut subtypes = self.subtypes.write();
        if !subtypes.all.contains(&subtype) {
            subtypes.all.push(subtype);
        }
    }

    /// Make the subtype for `locale` active.
    pub fn switch_to(&self, locale: &str) -> BootResult<()> {
        let mut subtypes = self.subtypes.write();
        let index = subtypes
            .all
            .iter()
            .position(|s| s.locale == locale)
            .ok_or_else(|| {
                BootError::manager(ManagerKind::Subtype, format!("no subtype for {}", locale))
            })?;
        subtypes.active = index;
        Ok(())
    }
}

/// Resolves the layout the keyboard shows for the active subtype.
#[derive(Debug)]
pub struct KeyboardManager {
    subtypes: Arc<SubtypeManager>,
}

impl KeyboardManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            subtypes: state.subtype_manager(),
        }
    }

    /// Layout name for the active subtype.
    pub fn active_layout(&self) -> String {
        self.subtypes.active().layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BootConfig;
    use crate::platform::DirPlatform;

    fn state() -> Arc<AppState> {
        let config = BootConfig::new("/nonexistent/imeboot");
        let platform = Arc::new(DirPlatform::from_config(&config));
        AppState::builder(config, platform).build()
    }

    #[test]
    fn test_keyboard_follows_active_subtype() {
        let state = state();
        let subtypes = state.subtype_manager();
        subtypes.add(Subtype::new("de_DE", "qwertz"));
        subtypes.add(Subtype::new("de_DE", "qwertz"));
        assert_eq!(subtypes.subtypes().len(), 2);

        assert_eq!(state.keyboard_manager().active_layout(), "qwerty");
        subtypes.switch_to("de_DE").unwrap();
        assert_eq!(state.keyboard_manager().active_layout(), "qwertz");
    }

    #[test]
    fn test_switch_to_unknown_locale_fails() {
        let state = state();
        assert!(matches!(
            state.subtype_manager().switch_to("fr_FR"),
            Err(BootError::ManagerInit { manager: ManagerKind::Subtype, .. })
        ));
        assert_eq!(state.subtype_manager().active().locale, "en_US");
    }
}
