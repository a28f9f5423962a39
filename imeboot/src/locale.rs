//! Locale-data loader.
//!
//! Extracts the packaged ICU common-data asset into a temp file inside the
//! context's cache directory, hands the temp file's path to the native
//! initializer, and deletes the temp file before returning.
//!
//! # Temp Artifact Lifetime
//!
//! ```text
//! open asset ─► create temp ─► copy + flush ─► native init ─► delete temp
//!      │              │               │                            ▲
//!      └── fail: no temp file         └── fail: temp dropped ──────┘
//! ```
//!
//! Every exit path after the temp file is created deletes it: the explicit
//! `close()` after the native call, or the drop of the `NamedTempFile` on an
//! early return or while unwinding from a panic.

use std::fs;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::app::{BootError, BootResult};
use crate::native::LocaleDataInitializer;
use crate::platform::StorageContext;

const TEMP_PREFIX: &str = "icudt";
const TEMP_SUFFIX: &str = ".dat";

/// Extracts locale data and hands it to the native initializer.
pub struct LocaleDataLoader<'a> {
    asset_path: &'a str,
    native: &'a dyn LocaleDataInitializer,
    slow_threshold: Duration,
}

impl<'a> LocaleDataLoader<'a> {
    pub fn new(asset_path: &'a str, native: &'a dyn LocaleDataInitializer) -> Self {
        Self {
            asset_path,
            native,
            slow_threshold: Duration::MAX,
        }
    }

    /// Warn when the native call takes longer than `threshold`.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Load locale data through `ctx`.
    ///
    /// Returns `true` only when the native initializer reported success.
    /// Every failure, including a panic in the initializer or the asset
    /// source, is logged and reduced to `false`.
    pub fn load(&self, ctx: &dyn StorageContext) -> bool {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_load(ctx)))
            .unwrap_or_else(|payload| Err(BootError::from_panic(payload.as_ref())));
        match outcome {
            Ok(()) => {
                info!(asset = self.asset_path, storage = %ctx.kind(), "Locale data loaded");
                true
            }
            Err(BootError::NativeInitFailure { code }) => {
                error!(
                    asset = self.asset_path,
                    code, "Native locale-data initialization failed with status {}", code
                );
                false
            }
            Err(e) => {
                error!(asset = self.asset_path, error = %e, "Locale data unavailable");
                false
            }
        }
    }

    /// Load locale data through `ctx`, returning the typed failure.
    pub fn try_load(&self, ctx: &dyn StorageContext) -> BootResult<()> {
        if !self.native.is_available() {
            return Err(BootError::NativeUnavailable(
                "initializer not loaded".to_string(),
            ));
        }

        let mut source =
            ctx.open_asset(self.asset_path)
                .map_err(|e| BootError::AssetUnavailable {
                    path: self.asset_path.to_string(),
                    source: e,
                })?;

        let cache_dir = ctx.cache_dir();
        fs::create_dir_all(cache_dir).map_err(|e| BootError::TempFile {
            dir: cache_dir.to_path_buf(),
            source: e,
        })?;
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(cache_dir)
            .map_err(|e| BootError::TempFile {
                dir: cache_dir.to_path_buf(),
                source: e,
            })?;

        let copied = copy_all(&mut source, &mut temp).map_err(|e| BootError::CopyFailed {
            asset: self.asset_path.to_string(),
            target: temp.path().to_path_buf(),
            source: e,
        })?;
        debug!(
            bytes = copied,
            temp = %temp.path().display(),
            "Locale data extracted"
        );

        let started = Instant::now();
        let status = self.native.init_locale_data(temp.path());
        let elapsed = started.elapsed();
        if elapsed > self.slow_threshold {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Native locale-data initializer was slow"
            );
        }

        let temp_path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            warn!(temp = %temp_path.display(), error = %e, "Failed to delete locale-data temp file");
        }

        match status? {
            0 => Ok(()),
            code => Err(BootError::NativeInitFailure { code }),
        }
    }
}

fn copy_all(source: &mut dyn io::Read, temp: &mut NamedTempFile) -> io::Result<u64> {
    let mut writer = io::BufWriter::new(temp.as_file_mut());
    let copied = io::copy(source, &mut writer)?;
    writer.flush()?;
    drop(writer);
    temp.as_file().sync_all()?;
    Ok(copied)
}
