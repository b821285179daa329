// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
// The windows API conventions are kept deliberately, so it's easier to refer to references.
#![allow(clippy::upper_case_acronyms)]
#![allow(non_snake_case)]

use std::ffi;
pub use std::os::windows::raw::HANDLE;

pub type HMODULE = HANDLE;
pub type PCWSTR = *const u16;
pub type PCSTR = *const ffi::c_char;
pub type PWSTR = *mut u16;
pub type BOOL = i32;
pub type DWORD = u32;

pub const FORMAT_MESSAGE_IGNORE_INSERTS: DWORD = 0x00000200;
pub const FORMAT_MESSAGE_FROM_SYSTEM: DWORD = 0x00001000;

extern "system" {
	pub fn LoadLibraryExW(lplibfilename: PCWSTR, hfile: HANDLE, dwflags: DWORD) -> HMODULE;
	pub fn GetModuleHandleW(lpmodulename: PCWSTR) -> HMODULE;
	pub fn GetProcAddress(hmodule: HMODULE, lpprocname: PCSTR) -> *mut ffi::c_void;
	pub fn FreeLibrary(hlibmodule: HMODULE) -> BOOL;
	pub fn GetLastError() -> DWORD;
	pub fn FormatMessageW(
		dwflags: DWORD,
		lpsource: *const ffi::c_void,
		dwmessageid: DWORD,
		dwlanguageid: DWORD,
		lpbuffer: PWSTR,
		nsize: DWORD,
		arguments: *mut ffi::c_void,
	) -> DWORD;
}
