// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::{self, CStr};
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use super::Handle;
use crate::{last_error, OpenOptions};

mod c;

/// Search the application directory, `System32`, and directories added with `AddDllDirectory`.
pub const LOAD_LIBRARY_SEARCH_DEFAULT_DIRS: u32 = 0x00001000;
/// Only search the current directory when it is under the application directory.
pub const LOAD_LIBRARY_SAFE_CURRENT_DIRS: u32 = 0x00002000;
/// Resolve dependencies relative to the directory of the library being loaded.
pub const LOAD_WITH_ALTERED_SEARCH_PATH: u32 = 0x00000008;

// Same capacity as the error slot; longer system messages are cut there anyway.
const MESSAGE_CAPACITY: usize = last_error::CAPACITY;

fn to_wide(path: &ffi::OsStr) -> Option<Vec<u16>> {
	let mut wide: Vec<u16> = path.encode_wide().collect();
	if wide.contains(&0) {
		return None;
	}
	wide.push(0);
	Some(wide)
}

// Formats `GetLastError` into the error slot as `context: message`.
unsafe fn capture_error(context: &str) {
	let code = c::GetLastError();
	if code == 0 {
		last_error::set_system_message(context, code, None);
		return;
	}
	let mut buffer = [0u16; MESSAGE_CAPACITY];
	let len = c::FormatMessageW(
		c::FORMAT_MESSAGE_FROM_SYSTEM | c::FORMAT_MESSAGE_IGNORE_INSERTS,
		ptr::null(),
		code,
		0,
		buffer.as_mut_ptr(),
		buffer.len() as c::DWORD,
		ptr::null_mut(),
	) as usize;
	let text = (len != 0).then(|| &buffer[..len.min(buffer.len())]);
	last_error::set_system_message(context, code, text);
}

// The main module handle is its base address, which stays put for the life of the process.
unsafe fn main_module() -> Handle {
	c::GetModuleHandleW(ptr::null())
}

/// Opens `path` with `LoadLibraryExW`, or returns the main module when `path` is absent or empty.
///
/// The main module is returned without taking a reference.
pub(crate) unsafe fn dylib_open(path: Option<&ffi::OsStr>, options: &OpenOptions) -> Handle {
	last_error::clear();
	let Some(path) = path.filter(|path| !path.is_empty()) else {
		let handle = main_module();
		if handle.is_null() {
			capture_error("GetModuleHandleW(NULL)");
		}
		return handle;
	};
	let Some(wide) = to_wide(path) else {
		last_error::set_str("library path contains a NUL byte");
		return ptr::null_mut();
	};
	let handle = c::LoadLibraryExW(wide.as_ptr(), ptr::null_mut(), options.load_flags());
	if handle.is_null() {
		capture_error("LoadLibraryExW failed");
		tracing::debug!(?path, "LoadLibraryExW failed");
	} else {
		tracing::debug!(?path, ?handle, "library opened");
	}
	handle
}

/// Looks `name` up in `handle`, or in the main module when `handle` is null.
pub(crate) unsafe fn dylib_symbol(handle: Handle, name: &CStr) -> *mut ffi::c_void {
	last_error::clear();
	let module = if handle.is_null() {
		let module = main_module();
		if module.is_null() {
			capture_error("GetModuleHandleW(NULL)");
			return ptr::null_mut();
		}
		module
	} else {
		handle
	};
	let addr = c::GetProcAddress(module, name.as_ptr());
	if addr.is_null() {
		capture_error("GetProcAddress failed");
	}
	tracing::trace!(?name, ?addr, "GetProcAddress");
	addr
}

/// Releases `handle`. Null handles and the main module are left alone.
pub(crate) unsafe fn dylib_close(handle: Handle) -> ffi::c_int {
	last_error::clear();
	if handle.is_null() || handle == main_module() {
		return 0;
	}
	if c::FreeLibrary(handle) == 0 {
		capture_error("FreeLibrary failed");
		tracing::debug!(?handle, "FreeLibrary failed");
		-1
	} else {
		tracing::debug!(?handle, "library closed");
		0
	}
}
