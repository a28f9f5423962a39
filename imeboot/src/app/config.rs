//! Bootstrap configuration.
//!
//! This module defines `BootConfig`, which combines everything needed to run
//! the cold-start sequence: storage roots, the locale-data asset, the native
//! library, logging, preferences and crash reporting.
//!
//! # File Format
//!
//! ```ini
//! [paths]
//! root = /data/imeboot
//! assets = /opt/imeboot/assets
//!
//! [locale]
//! asset_path = icu/icudt66l.dat
//! slow_native_ms = 2000
//!
//! [native]
//! library = /opt/imeboot/lib/libfl_native.so
//! symbol = fl_init_icu_data
//!
//! [logging]
//! directory = /data/imeboot/logs
//! level = info
//!
//! [preferences]
//! file_name = preferences.ini
//! autosave_secs = 30
//!
//! [crash]
//! directory = /data/imeboot/crash
//! panic_hook = true
//!
//! [storage]
//! split = true
//! sweep_cache = true
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::error::{BootError, BootResult};

/// Logical path of the packaged locale data.
pub const DEFAULT_LOCALE_ASSET: &str = "icu/icudt66l.dat";

/// Exported symbol of the native locale library.
pub const DEFAULT_NATIVE_SYMBOL: &str = "fl_init_icu_data";

/// Default preference autosave interval (in seconds).
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Native calls slower than this are logged at warn level.
const DEFAULT_SLOW_NATIVE_MS: u64 = 2_000;

/// Storage roots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathsConfig {
    /// Credential-protected storage root (available after user unlock).
    pub credential_dir: PathBuf,
    /// Device-protected storage root (available before user unlock).
    pub device_dir: PathBuf,
    /// Packaged, read-only assets.
    pub asset_dir: PathBuf,
}

impl PathsConfig {
    /// Derive all storage roots from a single data root.
    pub fn under(root: &Path) -> Self {
        Self {
            credential_dir: root.join("credential"),
            device_dir: root.join("device"),
            asset_dir: root.join("assets"),
        }
    }
}

/// Locale-data asset configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocaleConfig {
    /// Logical asset path of the versioned locale data.
    pub asset_path: String,
    /// Threshold above which a native call is reported as slow.
    pub slow_native_threshold: Duration,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            asset_path: DEFAULT_LOCALE_ASSET.to_string(),
            slow_native_threshold: Duration::from_millis(DEFAULT_SLOW_NATIVE_MS),
        }
    }
}

/// Native locale library configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeConfig {
    /// Shared library to load. `None` uses the built-in header probe.
    pub library: Option<PathBuf>,
    /// Initializer symbol exported by the library.
    pub symbol: String,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library: None,
            symbol: DEFAULT_NATIVE_SYMBOL.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for rolling JSON log files. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    /// Default filter directive, overridable with `IMEBOOT_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            level: "info".to_string(),
        }
    }
}

/// Preference store configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreferencesConfig {
    /// File name inside the credential-protected files directory.
    pub file_name: String,
    /// Background save interval.
    pub autosave_interval: Duration,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            file_name: "preferences.ini".to_string(),
            autosave_interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
        }
    }
}

/// Crash reporter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrashConfig {
    /// Directory for staged crash reports. `None` keeps them in memory only.
    pub directory: Option<PathBuf>,
    /// Chain a panic hook that stages panics as crash reports.
    pub panic_hook: bool,
}

/// Bootstrap configuration combining all component configs.
///
/// This is the top-level configuration handed to `AppState::builder()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootConfig {
    pub paths: PathsConfig,
    pub locale: LocaleConfig,
    pub native: NativeConfig,
    pub logging: LoggingConfig,
    pub preferences: PreferencesConfig,
    pub crash: CrashConfig,
    /// Whether the platform separates device- and credential-protected storage.
    pub split_storage: bool,
    /// Remove stale cache contents before extracting locale data.
    pub sweep_cache: bool,
}

impl BootConfig {
    /// Create a config with every storage root under `root` and defaults
    /// everywhere else.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            paths: PathsConfig::under(root.as_ref()),
            locale: LocaleConfig::default(),
            native: NativeConfig::default(),
            logging: LoggingConfig::default(),
            preferences: PreferencesConfig::default(),
            crash: CrashConfig::default(),
            split_storage: true,
            sweep_cache: true,
        }
    }

    /// Default data root (`<local data dir>/imeboot`).
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("imeboot")
    }

    /// Load configuration from an INI file.
    pub fn load(path: impl AsRef<Path>) -> BootResult<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)
            .map_err(|e| BootError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ini(&ini)
    }

    /// Build configuration from parsed INI content.
    ///
    /// Missing sections and keys fall back to defaults; unknown keys are
    /// ignored.
    pub fn from_ini(ini: &Ini) -> BootResult<Self> {
        let root = get(ini, "paths", "root")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_root);
        let mut config = Self::new(&root);

        if let Some(dir) = get(ini, "paths", "credential") {
            config.paths.credential_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ini, "paths", "device") {
            config.paths.device_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ini, "paths", "assets") {
            config.paths.asset_dir = PathBuf::from(dir);
        }

        if let Some(asset) = get(ini, "locale", "asset_path") {
            config.locale.asset_path = asset.to_string();
        }
        if let Some(ms) = parse::<u64>(ini, "locale", "slow_native_ms")? {
            config.locale.slow_native_threshold = Duration::from_millis(ms);
        }

        config.native.library = get(ini, "native", "library").map(PathBuf::from);
        if let Some(symbol) = get(ini, "native", "symbol") {
            config.native.symbol = symbol.to_string();
        }

        config.logging.directory = get(ini, "logging", "directory").map(PathBuf::from);
        if let Some(level) = get(ini, "logging", "level") {
            config.logging.level = level.to_string();
        }

        if let Some(name) = get(ini, "preferences", "file_name") {
            config.preferences.file_name = name.to_string();
        }
        if let Some(secs) = parse::<u64>(ini, "preferences", "autosave_secs")? {
            if secs == 0 {
                return Err(BootError::Config(
                    "preferences.autosave_secs must be greater than zero".to_string(),
                ));
            }
            config.preferences.autosave_interval = Duration::from_secs(secs);
        }

        config.crash.directory = get(ini, "crash", "directory").map(PathBuf::from);
        if let Some(hook) = parse::<bool>(ini, "crash", "panic_hook")? {
            config.crash.panic_hook = hook;
        }

        if let Some(split) = parse::<bool>(ini, "storage", "split")? {
            config.split_storage = split;
        }
        if let Some(sweep) = parse::<bool>(ini, "storage", "sweep_cache")? {
            config.sweep_cache = sweep;
        }

        Ok(config)
    }

    /// Render the effective configuration as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("paths"))
            .set("credential", self.paths.credential_dir.display().to_string())
            .set("device", self.paths.device_dir.display().to_string())
            .set("assets", self.paths.asset_dir.display().to_string());
        ini.with_section(Some("locale"))
            .set("asset_path", self.locale.asset_path.as_str())
            .set(
                "slow_native_ms",
                self.locale.slow_native_threshold.as_millis().to_string(),
            );
        {
            let mut native = ini.with_section(Some("native"));
            if let Some(library) = &self.native.library {
                native.set("library", library.display().to_string());
            }
            native.set("symbol", self.native.symbol.as_str());
        }
        {
            let mut logging = ini.with_section(Some("logging"));
            if let Some(dir) = &self.logging.directory {
                logging.set("directory", dir.display().to_string());
            }
            logging.set("level", self.logging.level.as_str());
        }
        ini.with_section(Some("preferences"))
            .set("file_name", self.preferences.file_name.as_str())
            .set(
                "autosave_secs",
                self.preferences.autosave_interval.as_secs().to_string(),
            );
        {
            let mut crash = ini.with_section(Some("crash"));
            if let Some(dir) = &self.crash.directory {
                crash.set("directory", dir.display().to_string());
            }
            crash.set("panic_hook", self.crash.panic_hook.to_string());
        }
        ini.with_section(Some("storage"))
            .set("split", self.split_storage.to_string())
            .set("sweep_cache", self.sweep_cache.to_string());
        ini
    }

    /// The effective configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec does not fail.
        let _ = self.to_ini().write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Set the locale-data asset path.
    pub fn with_locale_asset(mut self, asset_path: impl Into<String>) -> Self {
        self.locale.asset_path = asset_path.into();
        self
    }

    /// Set the native library and symbol.
    pub fn with_native_library(mut self, library: PathBuf, symbol: impl Into<String>) -> Self {
        self.native.library = Some(library);
        self.native.symbol = symbol.into();
        self
    }

    /// Set the log directory.
    pub fn with_log_dir(mut self, directory: PathBuf) -> Self {
        self.logging.directory = Some(directory);
        self
    }

    /// Set the crash report directory.
    pub fn with_crash_dir(mut self, directory: PathBuf) -> Self {
        self.crash.directory = Some(directory);
        self
    }

    /// Set whether the platform separates device and credential storage.
    pub fn with_split_storage(mut self, split: bool) -> Self {
        self.split_storage = split;
        self
    }

    /// Set the preference autosave interval.
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.preferences.autosave_interval = interval;
        self
    }

    /// Set whether stale cache contents are swept at start.
    pub fn with_cache_sweep(mut self, sweep: bool) -> Self {
        self.sweep_cache = sweep;
        self
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(ini: &Ini, section: &str, key: &str) -> BootResult<Option<T>> {
    match get(ini, section, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            BootError::Config(format!("invalid value '{}' for {}.{}", raw, section, key))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_paths_from_root() {
        let config = BootConfig::new("/data");
        assert_eq!(config.paths.credential_dir, PathBuf::from("/data/credential"));
        assert_eq!(config.paths.device_dir, PathBuf::from("/data/device"));
        assert_eq!(config.paths.asset_dir, PathBuf::from("/data/assets"));
        assert_eq!(config.locale.asset_path, DEFAULT_LOCALE_ASSET);
        assert!(config.split_storage);
        assert!(config.sweep_cache);
    }

    #[test]
    fn test_from_ini_overrides() {
        let ini = Ini::load_from_str(
            "[paths]\nroot = /srv/ime\nassets = /opt/assets\n\
             [locale]\nasset_path = icu/icudt72l.dat\nslow_native_ms = 50\n\
             [native]\nlibrary = /opt/lib/libfl.so\n\
             [preferences]\nautosave_secs = 5\n\
             [storage]\nsplit = false\n",
        )
        .unwrap();
        let config = BootConfig::from_ini(&ini).unwrap();

        assert_eq!(config.paths.credential_dir, PathBuf::from("/srv/ime/credential"));
        assert_eq!(config.paths.asset_dir, PathBuf::from("/opt/assets"));
        assert_eq!(config.locale.asset_path, "icu/icudt72l.dat");
        assert_eq!(config.locale.slow_native_threshold, Duration::from_millis(50));
        assert_eq!(config.native.library, Some(PathBuf::from("/opt/lib/libfl.so")));
        assert_eq!(config.native.symbol, DEFAULT_NATIVE_SYMBOL);
        assert_eq!(config.preferences.autosave_interval, Duration::from_secs(5));
        assert!(!config.split_storage);
    }

    #[test]
    fn test_from_ini_rejects_malformed_value() {
        let ini = Ini::load_from_str("[storage]\nsplit = maybe\n").unwrap();
        let err = BootConfig::from_ini(&ini).unwrap_err();
        assert!(err.to_string().contains("storage.split"));
    }

    #[test]
    fn test_from_ini_rejects_zero_autosave() {
        let ini = Ini::load_from_str("[preferences]\nautosave_secs = 0\n").unwrap();
        assert!(matches!(
            BootConfig::from_ini(&ini),
            Err(BootError::Config(_))
        ));
    }

    #[test]
    fn test_to_ini_round_trips_through_from_ini() {
        let config = BootConfig::new("/data")
            .with_log_dir(PathBuf::from("/data/logs"))
            .with_split_storage(false);
        let reparsed = BootConfig::from_ini(&config.to_ini()).unwrap();
        assert_eq!(reparsed.paths, config.paths);
        assert_eq!(reparsed.logging, config.logging);
        assert_eq!(reparsed.split_storage, config.split_storage);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BootConfig::load(dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, BootError::Config(_)));
    }
}
