//! Probe command - validate a locale-data file with the built-in initializer.

use std::path::Path;

use imeboot::native::{
    PROBE_BAD_MAGIC, PROBE_INVALID_PATH, PROBE_NOT_COMMON_DATA, PROBE_OK, PROBE_READ_FAILED,
    PROBE_TRUNCATED,
};
use imeboot::{LocaleDataInitializer, NativeLocaleLibrary};

use crate::error::CliError;

/// Human-readable meaning of a probe status.
pub fn describe(status: i32) -> &'static str {
    match status {
        PROBE_OK => "valid ICU common data",
        PROBE_INVALID_PATH => "path cannot be passed to the native library",
        PROBE_READ_FAILED => "file could not be read",
        PROBE_TRUNCATED => "file is shorter than an ICU header",
        PROBE_BAD_MAGIC => "missing ICU data magic",
        PROBE_NOT_COMMON_DATA => "ICU data, but not a common-data package",
        _ => "unknown status",
    }
}

/// Run the probe command.
pub fn run(file: &Path) -> Result<(), CliError> {
    let file = std::fs::canonicalize(file)
        .map_err(|e| CliError::Probe(format!("{}: {}", file.display(), e)))?;
    let status = NativeLocaleLibrary::builtin().init_locale_data(&file)?;
    if status == PROBE_OK {
        println!("{}: {}", file.display(), describe(status));
        Ok(())
    } else {
        Err(CliError::Probe(format!(
            "{}: status {} ({})",
            file.display(),
            status,
            describe(status)
        )))
    }
}
