//! CLI command implementations.

pub mod boot;
pub mod config;
pub mod probe;

use std::path::{Path, PathBuf};

use imeboot::app::PathsConfig;
use imeboot::BootConfig;

use crate::error::CliError;

/// Load the configuration file if given, otherwise use defaults under
/// `root` (or the default data root). An explicit `root` overrides the
/// storage roots from the file.
pub fn resolve_config(config: Option<&Path>, root: Option<PathBuf>) -> Result<BootConfig, CliError> {
    let mut boot_config = match config {
        Some(path) => BootConfig::load(path)?,
        None => BootConfig::new(root.clone().unwrap_or_else(BootConfig::default_root)),
    };
    if let Some(root) = root {
        boot_config.paths = PathsConfig::under(&root);
    }
    Ok(boot_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_root_overrides_file_paths() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("imeboot.ini");
        fs::write(&file, "[paths]\nroot = /srv/ime\n[storage]\nsplit = false\n").unwrap();

        let config = resolve_config(Some(&file), Some(PathBuf::from("/tmp/ime"))).unwrap();
        assert_eq!(config.paths.device_dir, PathBuf::from("/tmp/ime/device"));
        assert!(!config.split_storage);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("imeboot.ini");
        fs::write(&file, "[storage]\nsplit = sometimes\n").unwrap();

        assert!(matches!(
            resolve_config(Some(&file), None),
            Err(CliError::Config(_))
        ));
    }
}
