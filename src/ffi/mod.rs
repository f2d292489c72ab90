//! Exported C symbols
//!
//! Every function converts its pointer arguments, delegates to the
//! process-wide [`Facade`] and converts the result back. Argument errors
//! (null or non-UTF-8 virtual paths) are reported like any other failure.
//!
//! Memory returned to callers is allocated with `malloc`; release it with the
//! matching `*_free` function.

pub mod alloc;

use crate::error::{AppImageError, Result};
use crate::facade::Facade;
use libc::{c_char, c_int, c_ulong, off_t};
use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

static FACADE: OnceLock<Facade> = OnceLock::new();

/// Use `facade` for every exported function
///
/// Must happen before the first exported call; afterwards the context is
/// fixed and `facade` is handed back.
///
/// Without an installed facade, the first exported call builds one with
/// [`Facade::from_environment`], which also installs the process-global
/// `tracing` subscriber. A Rust host that sets up its own subscriber after
/// that point finds the slot taken. Such hosts should install their
/// subscriber first, or install a facade here before calling any exported
/// function.
pub fn install_facade(facade: Facade) -> std::result::Result<(), Facade> {
    FACADE.set(facade)
}

/// Process-wide context, built from the environment on first use
pub fn facade() -> &'static Facade {
    FACADE.get_or_init(Facade::from_environment)
}

unsafe fn path_arg<'a>(raw: *const c_char) -> Result<&'a Path> {
    if raw.is_null() {
        return Err(AppImageError::InvalidArgument("null path".to_string()));
    }
    let bytes = CStr::from_ptr(raw).to_bytes();
    Ok(Path::new(OsStr::from_bytes(bytes)))
}

unsafe fn str_arg<'a>(raw: *const c_char) -> Result<&'a str> {
    if raw.is_null() {
        return Err(AppImageError::InvalidArgument("null string".to_string()));
    }
    CStr::from_ptr(raw)
        .to_str()
        .map_err(|_| AppImageError::InvalidArgument("string is not valid UTF-8".to_string()))
}

/// Check if a file is an AppImage
///
/// Returns the image type (1 or 2), or -1 if it isn't one. `verbose`
/// controls whether the failure reason is logged.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_get_type(path: *const c_char, verbose: bool) -> c_int {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.get_type(path, verbose),
        Err(e) => {
            facade.report("appimage_get_type", verbose, &e);
            -1
        }
    }
}

/// List the files embedded in an AppImage
///
/// The result is never null: failures produce an array holding only the
/// terminating null entry. Release with [`appimage_string_list_free`].
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_list_files(path: *const c_char) -> *mut *mut c_char {
    let facade = facade();
    let files = match path_arg(path) {
        Ok(path) => facade.list_files(path),
        Err(e) => {
            facade.report("appimage_list_files", true, &e);
            Vec::new()
        }
    };
    alloc::string_list(&files)
}

/// Release an array returned by [`appimage_list_files`]
///
/// # Safety
/// `list` must be null or an array from [`appimage_list_files`] that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn appimage_string_list_free(list: *mut *mut c_char) {
    alloc::release_list(list);
}

/// Read a file from the payload, following symlinks, into a new buffer
///
/// `*buffer` and `*buf_size` are set to null and 0 before anything else
/// happens and are only filled in on success. Release the buffer with
/// [`appimage_buffer_free`].
///
/// # Safety
/// `appimage_file_path` and `file_path` must be null or valid NUL-terminated
/// strings; `buffer` and `buf_size` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn appimage_read_file_into_buffer_following_symlinks(
    appimage_file_path: *const c_char,
    file_path: *const c_char,
    buffer: *mut *mut c_char,
    buf_size: *mut c_ulong,
) -> bool {
    const OPERATION: &str = "appimage_read_file_into_buffer_following_symlinks";
    let facade = facade();

    if buffer.is_null() || buf_size.is_null() {
        facade.report(
            OPERATION,
            true,
            &AppImageError::InvalidArgument("null output parameter".to_string()),
        );
        return false;
    }
    *buffer = ptr::null_mut();
    *buf_size = 0;

    let args = path_arg(appimage_file_path).and_then(|p| Ok((p, str_arg(file_path)?)));
    let (appimage, file) = match args {
        Ok(args) => args,
        Err(e) => {
            facade.report(OPERATION, true, &e);
            return false;
        }
    };

    match facade.read_file_following_symlinks(appimage, file) {
        Some(data) => {
            *buf_size = data.len() as c_ulong;
            *buffer = alloc::buffer(&data);
            true
        }
        None => false,
    }
}

/// Extract a file from the payload, following symlinks, to `target_file_path`
///
/// Returns false, without creating the target, when the file cannot be
/// resolved.
///
/// # Safety
/// All arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn appimage_extract_file_following_symlinks(
    appimage_file_path: *const c_char,
    file_path: *const c_char,
    target_file_path: *const c_char,
) -> bool {
    const OPERATION: &str = "appimage_extract_file_following_symlinks";
    let facade = facade();

    let args = path_arg(appimage_file_path).and_then(|appimage| {
        Ok((appimage, str_arg(file_path)?, path_arg(target_file_path)?))
    });
    match args {
        Ok((appimage, file, target)) => {
            facade.extract_file_following_symlinks(appimage, file, target)
        }
        Err(e) => {
            facade.report(OPERATION, true, &e);
            false
        }
    }
}

/// Release a buffer from [`appimage_read_file_into_buffer_following_symlinks`]
///
/// # Safety
/// `buffer` must be null or a buffer returned by this library that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn appimage_buffer_free(buffer: *mut c_char) {
    alloc::release(buffer);
}

/// Whether the AppImage's desktop file sets `X-AppImage-Integrate=false`
///
/// Returns 1 if set, 0 if not set, -1 on errors.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_shall_not_be_integrated(path: *const c_char) -> c_int {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.shall_not_be_integrated(path),
        Err(e) => {
            facade.report("appimage_shall_not_be_integrated", true, &e);
            -1
        }
    }
}

/// Whether the AppImage's desktop file sets `Terminal=true`
///
/// Returns 1 if set, 0 if not set, -1 on errors.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_is_terminal_app(path: *const c_char) -> c_int {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.is_terminal_app(path),
        Err(e) => {
            facade.report("appimage_is_terminal_app", true, &e);
            -1
        }
    }
}

/// md5 identifier of `path`, as used to name freedesktop thumbnails
///
/// Any byte string is a valid path. Returns null for a null or empty path.
/// Release with [`appimage_string_free`].
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_get_md5(path: *const c_char) -> *mut c_char {
    let path = match path_arg(path) {
        Ok(path) => path,
        Err(_) => return ptr::null_mut(),
    };
    match facade().get_md5(path) {
        Some(digest) => alloc::string(&digest),
        None => ptr::null_mut(),
    }
}

/// Release a string returned by this library
///
/// # Safety
/// `string` must be null or a string returned by this library that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn appimage_string_free(string: *mut c_char) {
    alloc::release(string);
}

/// Offset of the payload in the AppImage file, 0 on errors
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn appimage_get_payload_offset(path: *const c_char) -> off_t {
    if path.is_null() {
        return 0;
    }
    let path = Path::new(OsStr::from_bytes(CStr::from_ptr(path).to_bytes()));
    off_t::try_from(facade().payload_offset(path)).unwrap_or(0)
}

/// Register an AppImage in the system
///
/// Returns 0 on success, 1 otherwise.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[cfg(feature = "desktop-integration")]
#[no_mangle]
pub unsafe extern "C" fn appimage_register_in_system(path: *const c_char, verbose: bool) -> c_int {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.register_in_system(path, verbose),
        Err(e) => {
            facade.report("appimage_register_in_system", verbose, &e);
            1
        }
    }
}

/// Unregister an AppImage from the system
///
/// Returns 0 on success, 1 otherwise.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[cfg(feature = "desktop-integration")]
#[no_mangle]
pub unsafe extern "C" fn appimage_unregister_in_system(
    path: *const c_char,
    verbose: bool,
) -> c_int {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.unregister_in_system(path, verbose),
        Err(e) => {
            facade.report("appimage_unregister_in_system", verbose, &e);
            1
        }
    }
}

/// Whether the AppImage is registered in the system already
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[cfg(feature = "desktop-integration")]
#[no_mangle]
pub unsafe extern "C" fn appimage_is_registered_in_system(path: *const c_char) -> bool {
    let facade = facade();
    match path_arg(path) {
        Ok(path) => facade.is_registered_in_system(path),
        Err(e) => {
            facade.report("appimage_is_registered_in_system", true, &e);
            false
        }
    }
}

/// Create the freedesktop thumbnails of an AppImage
///
/// # Safety
/// `appimage_file_path` must be null or a valid NUL-terminated string.
#[cfg(feature = "thumbnailer")]
#[no_mangle]
pub unsafe extern "C" fn appimage_create_thumbnail(appimage_file_path: *const c_char, verbose: bool) {
    let facade = facade();
    match path_arg(appimage_file_path) {
        Ok(path) => facade.create_thumbnail(path, verbose),
        Err(e) => facade.report("appimage_create_thumbnail", verbose, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_path_arg() {
        let raw = CString::new("/apps/demo.AppImage").unwrap();
        unsafe {
            assert_eq!(path_arg(raw.as_ptr()).unwrap(), Path::new("/apps/demo.AppImage"));
            assert!(matches!(
                path_arg(ptr::null()),
                Err(AppImageError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_str_arg_rejects_invalid_utf8() {
        let raw = CString::new(vec![b'a', 0xff, b'b']).unwrap();
        unsafe {
            assert!(matches!(
                str_arg(raw.as_ptr()),
                Err(AppImageError::InvalidArgument(_))
            ));
            // Container paths are raw bytes and accept it
            assert!(path_arg(raw.as_ptr()).is_ok());
        }
    }
}
