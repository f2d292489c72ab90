//! C-allocated results
//!
//! Everything handed to C callers is allocated with `malloc` so that the
//! paired release functions (and plain `free(3)`, which existing callers of
//! the library rely on) can reclaim it.

use libc::{c_char, c_void};
use std::alloc::{handle_alloc_error, Layout};
use std::mem;
use std::ptr;

fn malloc_or_abort(size: usize) -> *mut c_void {
    let size = size.max(1);
    // SAFETY: malloc accepts any non-zero size
    let raw = unsafe { libc::malloc(size) };
    if raw.is_null() {
        match Layout::from_size_align(size, mem::align_of::<usize>()) {
            Ok(layout) => handle_alloc_error(layout),
            Err(_) => std::process::abort(),
        }
    }
    raw
}

/// Copy `bytes` into a fresh `malloc` block (at least one byte long)
pub fn buffer(bytes: &[u8]) -> *mut c_char {
    let raw = malloc_or_abort(bytes.len()) as *mut u8;
    // SAFETY: raw holds at least bytes.len() bytes and cannot overlap bytes
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len()) };
    raw as *mut c_char
}

/// NUL-terminated copy of `text`
pub fn string(text: &str) -> *mut c_char {
    let len = text.len();
    let raw = malloc_or_abort(len + 1) as *mut u8;
    // SAFETY: raw holds len + 1 bytes
    unsafe {
        ptr::copy_nonoverlapping(text.as_ptr(), raw, len);
        *raw.add(len) = 0;
    }
    raw as *mut c_char
}

/// Null-terminated array of NUL-terminated strings
///
/// An empty input yields an array holding only the terminator.
pub fn string_list<S: AsRef<str>>(items: &[S]) -> *mut *mut c_char {
    let slots = items.len() + 1;
    let raw = malloc_or_abort(slots * mem::size_of::<*mut c_char>()) as *mut *mut c_char;
    for (idx, item) in items.iter().enumerate() {
        // SAFETY: idx < items.len() < slots
        unsafe { *raw.add(idx) = string(item.as_ref()) };
    }
    // SAFETY: items.len() < slots
    unsafe { *raw.add(items.len()) = ptr::null_mut() };
    raw
}

/// Release a block from [`buffer`] or [`string`]
///
/// # Safety
/// `raw` must be null or come from this module and not have been released.
pub unsafe fn release(raw: *mut c_char) {
    if !raw.is_null() {
        libc::free(raw as *mut c_void);
    }
}

/// Release an array from [`string_list`] and every string in it
///
/// # Safety
/// `list` must be null or come from [`string_list`] and not have been
/// released.
pub unsafe fn release_list(list: *mut *mut c_char) {
    if list.is_null() {
        return;
    }
    let mut cursor = list;
    while !(*cursor).is_null() {
        libc::free(*cursor as *mut c_void);
        cursor = cursor.add(1);
    }
    libc::free(list as *mut c_void);
}
