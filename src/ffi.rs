// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! The loader as a C ABI: four platform-uniform entry points for a marshalling layer written in
//! another language.
//!
//! Failures are reported by sentinel (a null pointer, or `-1` from [`dlbridge_close`]) and the
//! message is read with [`dlbridge_last_error`] before the next call on the same thread. Handles
//! carry no lifetime here: closing a handle twice, or using an address after its library is closed,
//! is undefined behaviour.

use std::borrow::Cow;
use std::ffi::{c_char, c_int, c_void, CStr, OsStr};
use std::ptr;

use crate::os::imp;
use crate::{last_error, OpenOptions};

#[cfg(unix)]
fn path_from_c(path: &CStr) -> Cow<'_, OsStr> {
	use std::os::unix::ffi::OsStrExt;
	Cow::Borrowed(OsStr::from_bytes(path.to_bytes()))
}

#[cfg(windows)]
fn path_from_c(path: &CStr) -> Cow<'_, OsStr> {
	match path.to_string_lossy() {
		Cow::Borrowed(path) => Cow::Borrowed(OsStr::new(path)),
		Cow::Owned(path) => Cow::Owned(path.into()),
	}
}

/// Opens the library at `path`, or the running process when `path` is null or empty.
///
/// Returns null on failure.
///
/// # Safety
///
/// `path` must be null or point to a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn dlbridge_open(path: *const c_char) -> *mut c_void {
	let path = (!path.is_null()).then(|| path_from_c(CStr::from_ptr(path)));
	imp::dylib_open(path.as_deref(), &OpenOptions::new())
}

/// Resolves `name` in `handle`, or in the process-wide scope when `handle` is null.
///
/// Returns null on failure.
///
/// # Safety
///
/// `handle` must be null or an open handle, and `name` must be null or point to a NUL terminated
/// string.
#[no_mangle]
pub unsafe extern "C" fn dlbridge_resolve(handle: *mut c_void, name: *const c_char) -> *mut c_void {
	if name.is_null() {
		last_error::set_str("symbol name is null");
		return ptr::null_mut();
	}
	imp::dylib_symbol(handle, CStr::from_ptr(name))
}

/// Releases `handle`. Null and the running process are accepted and left alone.
///
/// Returns `0` on success and `-1` on failure.
///
/// # Safety
///
/// `handle` must be null or an open handle, and must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn dlbridge_close(handle: *mut c_void) -> c_int {
	match imp::dylib_close(handle) {
		0 => 0,
		_ => -1,
	}
}

/// Returns the calling thread's last loader error, or null if the last operation succeeded.
///
/// The string stays valid until the next loader call on this thread.
#[no_mangle]
pub extern "C" fn dlbridge_last_error() -> *const c_char {
	last_error::as_ptr()
}
