// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::{self, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use super::Handle;
use crate::{last_error, OpenOptions};

// `dlerror` keeps its state per thread on these platforms, elsewhere it may be a process global.
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", target_env = "gnu")))]
#[inline]
fn dylib_guard() -> std::sync::MutexGuard<'static, ()> {
	static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
	LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", target_env = "gnu"))]
#[inline(always)]
fn dylib_guard() {}

// Copies the pending `dlerror` text into the error slot.
unsafe fn capture_error(fallback: &str) {
	let err = libc::dlerror();
	if err.is_null() {
		last_error::set_str(fallback);
	} else {
		last_error::set_bytes(CStr::from_ptr(err).to_bytes());
	}
}

/// Opens `path` with `dlopen`, or the running program when `path` is absent or empty.
pub(crate) unsafe fn dylib_open(path: Option<&ffi::OsStr>, options: &OpenOptions) -> Handle {
	last_error::clear();
	let c_path = match path.filter(|path| !path.is_empty()) {
		None => None,
		Some(path) => match CString::new(path.as_bytes()) {
			Ok(c_path) => Some(c_path),
			Err(_) => {
				last_error::set_str("library path contains a NUL byte");
				return ptr::null_mut();
			}
		},
	};
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	let handle = libc::dlopen(c_path.as_ref().map_or(ptr::null(), |p| p.as_ptr()), options.mode());
	if handle.is_null() {
		capture_error("unknown dlopen error");
		tracing::debug!(path = ?path, "dlopen failed");
	} else {
		tracing::debug!(path = ?path, ?handle, "library opened");
	}
	handle
}

/// Looks `name` up in `handle`, or in the default scope when `handle` is null.
pub(crate) unsafe fn dylib_symbol(handle: Handle, name: &CStr) -> *mut ffi::c_void {
	last_error::clear();
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	let scope = if handle.is_null() {
		libc::RTLD_DEFAULT
	} else {
		handle
	};
	let addr = libc::dlsym(scope, name.as_ptr());
	if addr.is_null() {
		capture_error("symbol lookup failed");
	}
	tracing::trace!(?name, ?addr, "dlsym");
	addr
}

/// Releases `handle`. Null handles and the running program's own handle are left alone.
pub(crate) unsafe fn dylib_close(handle: Handle) -> ffi::c_int {
	last_error::clear();
	if handle.is_null() || is_main_program(handle) {
		return 0;
	}
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	let result = libc::dlclose(handle);
	if result != 0 {
		capture_error("dlclose failed");
		tracing::debug!(?handle, "dlclose failed");
	} else {
		tracing::debug!(?handle, "library closed");
	}
	result
}

// `dlopen(NULL)` hands back the same handle for the program every time, so a fresh query is
// compared by address and its extra reference dropped straight away.
unsafe fn is_main_program(handle: Handle) -> bool {
	let this = libc::dlopen(ptr::null(), libc::RTLD_LAZY);
	if this.is_null() {
		return false;
	}
	libc::dlclose(this);
	this == handle
}
