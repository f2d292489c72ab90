//! Ownership of results handed across the C boundary
//!
//! Run with sanitizers:
//! - RUSTFLAGS="-Z sanitizer=address" cargo +nightly test --test memory_safety
//! - RUSTFLAGS="-Z sanitizer=leak" cargo +nightly test --test memory_safety

mod common;

use appimage::ffi::alloc;
use appimage::ffi::*;
use common::*;
use libc::{c_char, c_ulong};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::ptr;
use tempfile::TempDir;

#[test]
fn test_populated_list_released_once() {
    let temp = TempDir::new().unwrap();
    let image = CString::new(demo_appimage(temp.path()).as_os_str().as_bytes()).unwrap();

    for _ in 0..100 {
        unsafe {
            let list = appimage_list_files(image.as_ptr());
            appimage_string_list_free(list);
        }
    }
}

#[test]
fn test_empty_list_released_once() {
    let missing = CString::new("/nonexistent/Missing.AppImage").unwrap();
    for _ in 0..100 {
        unsafe {
            let list = appimage_list_files(missing.as_ptr());
            appimage_string_list_free(list);
        }
    }
}

#[test]
fn test_release_functions_accept_null() {
    unsafe {
        appimage_string_list_free(ptr::null_mut());
        appimage_buffer_free(ptr::null_mut());
        appimage_string_free(ptr::null_mut());
    }
}

#[test]
fn test_results_are_compatible_with_free() {
    // Callers of the historical API release with free(3)
    unsafe {
        libc::free(alloc::string("digest") as *mut libc::c_void);
        libc::free(alloc::buffer(b"bytes") as *mut libc::c_void);
    }
}

#[test]
fn test_buffers_outlive_the_call() {
    let temp = TempDir::new().unwrap();
    let image = CString::new(demo_appimage(temp.path()).as_os_str().as_bytes()).unwrap();
    let file = CString::new("usr/lib/libdemo.so").unwrap();

    let mut buffers = Vec::new();
    for _ in 0..10 {
        let mut buffer: *mut c_char = ptr::null_mut();
        let mut size: c_ulong = 0;
        unsafe {
            assert!(appimage_read_file_into_buffer_following_symlinks(
                image.as_ptr(),
                file.as_ptr(),
                &mut buffer,
                &mut size,
            ));
        }
        buffers.push((buffer, size));
    }

    for (buffer, size) in buffers {
        unsafe {
            let data = std::slice::from_raw_parts(buffer as *const u8, size as usize);
            assert_eq!(data, b"\x7fELF-lib");
            appimage_buffer_free(buffer);
        }
    }
}
