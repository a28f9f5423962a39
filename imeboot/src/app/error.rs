//! Bootstrap error types.

use std::any::Any;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::broadcast::ReceiverId;
use crate::managers::ManagerKind;

/// Result type for bootstrap operations.
pub type BootResult<T> = Result<T, BootError>;

/// Errors that can occur while bootstrapping the application.
///
/// Locale-data errors (`AssetUnavailable` through `InvalidNativePath`) are
/// handled inside the loader and reduced to a boolean. Everything else that
/// escapes a bootstrap pass is staged to the crash reporter.
#[derive(Debug, Error)]
pub enum BootError {
    /// The packaged locale-data asset could not be opened.
    #[error("asset {path} unavailable: {source}")]
    AssetUnavailable { path: String, source: io::Error },

    /// The native locale library is not available in this process.
    #[error("native locale library unavailable: {0}")]
    NativeUnavailable(String),

    /// The native initializer returned a non-zero status.
    #[error("native locale-data initialization failed with status {code}")]
    NativeInitFailure { code: i32 },

    /// The temp artifact could not be created.
    #[error("failed to create temp file in {dir}: {source}")]
    TempFile { dir: PathBuf, source: io::Error },

    /// Copying the asset into the temp artifact failed.
    #[error("failed to copy {asset} to {target}: {source}")]
    CopyFailed {
        asset: String,
        target: PathBuf,
        source: io::Error,
    },

    /// A path that cannot be handed across the C boundary.
    #[error("path {0} contains an interior NUL byte")]
    InvalidNativePath(PathBuf),

    /// Credential-protected storage was needed while still locked.
    #[error("credential-protected storage is locked")]
    StorageLocked,

    /// Preference store failure.
    #[error("preferences: {0}")]
    Preferences(String),

    /// A manager failed its storage-dependent initialization.
    #[error("{manager} manager initialization failed: {reason}")]
    ManagerInit {
        manager: ManagerKind,
        reason: String,
    },

    /// Filesystem error outside the locale-data path.
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// A bootstrap step panicked.
    #[error("bootstrap step panicked: {0}")]
    Panicked(String),

    /// A task needed an async runtime and none was running.
    #[error("no async runtime available for {0}")]
    NoRuntime(&'static str),

    /// The unlock listener could not be removed from the bus.
    #[error("failed to deregister broadcast receiver {id}")]
    ListenerDeregisterFailure { id: ReceiverId },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("logging initialization failed: {0}")]
    Logging(String),

    /// The crash reporter could not be installed or written.
    #[error("crash reporter: {0}")]
    CrashReporter(String),
}

impl BootError {
    /// Build an `Io` error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BootError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `ManagerInit` error.
    pub fn manager(manager: ManagerKind, reason: impl ToString) -> Self {
        BootError::ManagerInit {
            manager,
            reason: reason.to_string(),
        }
    }

    /// Convert a caught panic payload into `Panicked`.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        BootError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_failure_display_contains_code() {
        let err = BootError::NativeInitFailure { code: 7 };
        assert_eq!(
            err.to_string(),
            "native locale-data initialization failed with status 7"
        );
    }

    #[test]
    fn test_manager_error_names_manager() {
        let err = BootError::manager(ManagerKind::Theme, "no themes");
        assert!(err.to_string().contains("theme"));
        assert!(err.to_string().contains("no themes"));
    }

    #[test]
    fn test_panic_payload_becomes_message() {
        let payload = std::panic::catch_unwind(|| panic!("index {} corrupt", 3)).unwrap_err();
        assert!(matches!(
            BootError::from_panic(payload.as_ref()),
            BootError::Panicked(m) if m == "index 3 corrupt"
        ));
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert!(matches!(
            BootError::from_panic(payload.as_ref()),
            BootError::Panicked(m) if m == "non-string panic payload"
        ));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;
        let err = BootError::io("/tmp/x", io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/x"));
    }
}
