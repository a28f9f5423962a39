//! Native locale-data initializer boundary.
//!
//! The locale library exposes a single C entry point that takes the absolute
//! path of an ICU common-data file and returns an integer status, `0` meaning
//! success. The library is either loaded at runtime with `libloading` or
//! linked statically and handed over as a function pointer.
//!
//! A library that fails to load does not disappear silently: it is recorded
//! as unavailable, and the locale-data loader checks `is_available()` before
//! doing any work.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use libc::{c_char, c_int};
use libloading::Library;
use tracing::{info, warn};

use crate::app::{BootError, BootResult};

/// C signature of the locale-data initializer.
pub type NativeInitFn = unsafe extern "C" fn(path: *const c_char) -> c_int;

/// Status codes returned by [`icu_data_header_probe`].
pub const PROBE_OK: c_int = 0;
pub const PROBE_INVALID_PATH: c_int = 1;
pub const PROBE_READ_FAILED: c_int = 2;
pub const PROBE_TRUNCATED: c_int = 3;
pub const PROBE_BAD_MAGIC: c_int = 4;
pub const PROBE_NOT_COMMON_DATA: c_int = 5;

const ICU_MAGIC: [u8; 2] = [0xda, 0x27];
const ICU_COMMON_DATA_FORMAT: &[u8; 4] = b"CmnD";
const ICU_HEADER_PROBE_LEN: usize = 16;

/// Something that can initialize locale data from a file path.
pub trait LocaleDataInitializer: Send + Sync {
    /// Whether the initializer can be called at all.
    fn is_available(&self) -> bool;

    /// Hand the file at `path` to the initializer and return its raw status.
    fn init_locale_data(&self, path: &Path) -> BootResult<i32>;
}

enum Binding {
    Linked {
        entry: NativeInitFn,
        // Keeps the dynamic library mapped while `entry` is callable.
        _library: Option<Library>,
    },
    Unavailable(String),
}

/// Native locale library with an explicit availability flag.
pub struct NativeLocaleLibrary {
    name: String,
    binding: Binding,
}

impl std::fmt::Debug for NativeLocaleLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLocaleLibrary")
            .field("name", &self.name)
            .field("available", &self.is_available())
            .finish()
    }
}

impl NativeLocaleLibrary {
    /// Load `symbol` from the shared library at `path`.
    ///
    /// Never fails: a library or symbol that cannot be resolved yields an
    /// unavailable initializer and a warning.
    pub fn load(path: &Path, symbol: &str) -> Self {
        let name = path.display().to_string();
        match Self::resolve(path, symbol) {
            Ok((library, entry)) => {
                info!(library = %name, symbol, "Native locale library loaded");
                Self {
                    name,
                    binding: Binding::Linked {
                        entry,
                        _library: Some(library),
                    },
                }
            }
            Err(reason) => {
                warn!(library = %name, symbol, reason = %reason, "Native locale library unavailable");
                Self::unavailable(name, reason)
            }
        }
    }

    /// Wrap a statically linked entry point.
    pub fn from_entry(name: impl Into<String>, entry: NativeInitFn) -> Self {
        Self {
            name: name.into(),
            binding: Binding::Linked {
                entry,
                _library: None,
            },
        }
    }

    /// The built-in initializer that validates the ICU common-data header.
    pub fn builtin() -> Self {
        Self::from_entry("builtin-header-probe", icu_data_header_probe)
    }

    /// An initializer that is known not to be callable.
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: Binding::Unavailable(reason.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve(path: &Path, symbol: &str) -> Result<(Library, NativeInitFn), String> {
        // SAFETY: loading runs the library's initializers; the configured
        // library is trusted application code.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        // SAFETY: the symbol is declared with the `NativeInitFn` signature.
        let entry = unsafe {
            let symbol = library
                .get::<NativeInitFn>(symbol.as_bytes())
                .map_err(|e| e.to_string())?;
            *symbol
        };
        Ok((library, entry))
    }
}

impl LocaleDataInitializer for NativeLocaleLibrary {
    fn is_available(&self) -> bool {
        matches!(self.binding, Binding::Linked { .. })
    }

    fn init_locale_data(&self, path: &Path) -> BootResult<i32> {
        let entry = match &self.binding {
            Binding::Linked { entry, .. } => *entry,
            Binding::Unavailable(reason) => {
                return Err(BootError::NativeUnavailable(format!(
                    "{}: {}",
                    self.name, reason
                )))
            }
        };
        let c_path = path_to_cstring(path)?;
        // SAFETY: `c_path` is NUL-terminated and outlives the call.
        let status = unsafe { entry(c_path.as_ptr()) };
        Ok(status)
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> BootResult<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| BootError::InvalidNativePath(path.to_path_buf()))
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> BootResult<CString> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| BootError::InvalidNativePath(path.to_path_buf()))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(bytes).ok().map(PathBuf::from)
}

/// Check the leading bytes of an ICU common-data file.
pub fn check_icu_header(header: &[u8]) -> c_int {
    if header.len() < ICU_HEADER_PROBE_LEN {
        return PROBE_TRUNCATED;
    }
    if header[2..4] != ICU_MAGIC {
        return PROBE_BAD_MAGIC;
    }
    if &header[12..16] != ICU_COMMON_DATA_FORMAT {
        return PROBE_NOT_COMMON_DATA;
    }
    PROBE_OK
}

/// Built-in C entry point: validate the ICU common-data header of the file.
///
/// # Safety
///
/// `path` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe extern "C" fn icu_data_header_probe(path: *const c_char) -> c_int {
    if path.is_null() {
        return PROBE_INVALID_PATH;
    }
    let Some(path) = path_from_bytes(CStr::from_ptr(path).to_bytes()) else {
        return PROBE_INVALID_PATH;
    };
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(_) => return PROBE_READ_FAILED,
    };
    let mut header = [0u8; ICU_HEADER_PROBE_LEN];
    match file.read_exact(&mut header) {
        Ok(()) => check_icu_header(&header),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => PROBE_TRUNCATED,
        Err(_) => PROBE_READ_FAILED,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::icu_data_bytes;
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    unsafe extern "C" fn returns_seven(_path: *const c_char) -> c_int {
        7
    }

    #[test]
    fn test_check_icu_header() {
        let valid = icu_data_bytes();
        assert_eq!(check_icu_header(&valid), PROBE_OK);
        assert_eq!(check_icu_header(&valid[..8]), PROBE_TRUNCATED);

        let mut bad_magic = valid.clone();
        bad_magic[3] = 0x00;
        assert_eq!(check_icu_header(&bad_magic), PROBE_BAD_MAGIC);

        let mut wrong_format = valid;
        wrong_format[12..16].copy_from_slice(b"ResB");
        assert_eq!(check_icu_header(&wrong_format), PROBE_NOT_COMMON_DATA);
    }

    #[test]
    fn test_builtin_probe_through_c_boundary() {
        let temp = tempdir().unwrap();
        let good = temp.path().join("good.dat");
        let short = temp.path().join("short.dat");
        fs::write(&good, icu_data_bytes()).unwrap();
        fs::write(&short, [0xda]).unwrap();

        let library = NativeLocaleLibrary::builtin();
        assert!(library.is_available());
        assert_eq!(library.init_locale_data(&good).unwrap(), PROBE_OK);
        assert_eq!(library.init_locale_data(&short).unwrap(), PROBE_TRUNCATED);
        assert_eq!(
            library
                .init_locale_data(&temp.path().join("missing.dat"))
                .unwrap(),
            PROBE_READ_FAILED
        );
    }

    #[test]
    fn test_probe_rejects_null_path() {
        let status = unsafe { icu_data_header_probe(std::ptr::null()) };
        assert_eq!(status, PROBE_INVALID_PATH);
    }

    #[test]
    fn test_static_entry_status_is_passed_through() {
        let library = NativeLocaleLibrary::from_entry("test", returns_seven);
        assert_eq!(library.init_locale_data(Path::new("/tmp/x")).unwrap(), 7);
    }

    #[test]
    fn test_missing_library_is_unavailable() {
        let temp = tempdir().unwrap();
        let library =
            NativeLocaleLibrary::load(&temp.path().join("libabsent.so"), "fl_init_icu_data");
        assert!(!library.is_available());
        assert!(matches!(
            library.init_locale_data(Path::new("/tmp/x")),
            Err(BootError::NativeUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_interior_nul_path_is_rejected() {
        use std::os::unix::ffi::OsStrExt;
        let path = Path::new(std::ffi::OsStr::from_bytes(b"/tmp/a\0b"));
        let library = NativeLocaleLibrary::from_entry("test", returns_seven);
        assert!(matches!(
            library.init_locale_data(path),
            Err(BootError::InvalidNativePath(_))
        ));
    }
}
