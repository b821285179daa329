// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! Per-thread record of the most recent loader failure.
//!
//! Every loader operation clears the calling thread's slot on entry and writes to it only when it
//! fails, so the slot always describes the latest operation on that thread. The storage is a fixed
//! array: messages longer than [`CAPACITY`]` - 1` bytes are truncated, never reallocated.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::fmt;
#[cfg(any(windows, test))]
use std::fmt::Write;
use std::ptr;

/// Size of the slot in bytes, including the NUL terminator.
pub const CAPACITY: usize = 512;

#[derive(Clone, Copy)]
struct Slot {
	buf: [u8; CAPACITY],
	len: usize,
}

impl Slot {
	const fn new() -> Self {
		Self {
			buf: [0; CAPACITY],
			len: 0,
		}
	}

	fn clear(&mut self) {
		self.len = 0;
		self.buf[0] = 0;
	}

	fn set_bytes(&mut self, bytes: &[u8]) {
		let len = bytes.len().min(CAPACITY - 1);
		self.buf[..len].copy_from_slice(&bytes[..len]);
		self.buf[len] = 0;
		self.len = len;
	}

	fn as_c_str(&self) -> Option<&CStr> {
		if self.len == 0 {
			None
		} else {
			CStr::from_bytes_until_nul(&self.buf).ok()
		}
	}
}

// Appends, cutting on a char boundary once the slot is full.
impl fmt::Write for Slot {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		let room = CAPACITY - 1 - self.len;
		let mut take = s.len().min(room);
		while !s.is_char_boundary(take) {
			take -= 1;
		}
		self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
		self.len += take;
		self.buf[self.len] = 0;
		Ok(())
	}
}

thread_local! {
	static LAST_ERROR: RefCell<Slot> = const { RefCell::new(Slot::new()) };
}

/// Returns a copy of the calling thread's last loader error, or `None` if the last operation
/// succeeded.
///
/// This is a pure read; the slot is left untouched.
pub fn last_error() -> Option<String> {
	with_last_error(|msg| msg.map(|msg| msg.to_string_lossy().into_owned()))
}

/// Borrows the calling thread's last loader error without copying it.
pub fn with_last_error<R>(f: impl FnOnce(Option<&CStr>) -> R) -> R {
	LAST_ERROR.with(|slot| f(slot.borrow().as_c_str()))
}

pub(crate) fn clear() {
	LAST_ERROR.with(|slot| slot.borrow_mut().clear());
}

pub(crate) fn set_bytes(bytes: &[u8]) {
	LAST_ERROR.with(|slot| slot.borrow_mut().set_bytes(bytes));
}

pub(crate) fn set_str(message: &str) {
	set_bytes(message.as_bytes());
}

#[cfg(any(windows, test))]
pub(crate) fn set_fmt(args: fmt::Arguments<'_>) {
	LAST_ERROR.with(|slot| {
		let mut slot = slot.borrow_mut();
		slot.clear();
		let _ = slot.write_fmt(args);
	});
}

/// Pointer to the slot's NUL terminated text, or null if no error is pending.
///
/// The pointer stays valid until the next loader operation on this thread, or until the thread
/// exits.
pub(crate) fn as_ptr() -> *const c_char {
	LAST_ERROR.with(|slot| {
		let slot = slot.borrow();
		if slot.len == 0 {
			ptr::null()
		} else {
			slot.buf.as_ptr().cast()
		}
	})
}

/// Runs `f`, then puts back whatever the slot held before it ran.
pub(crate) fn preserve<R>(f: impl FnOnce() -> R) -> R {
	let saved = LAST_ERROR.with(|slot| *slot.borrow());
	let result = f();
	LAST_ERROR.with(|slot| *slot.borrow_mut() = saved);
	result
}

/// Records a system error code the way Windows reports it: `context: text`, with the trailing line
/// breaks `FormatMessageW` appends removed.
///
/// A zero code records `context` alone. When no text could be formatted the numeric code is
/// recorded instead.
#[cfg(any(windows, test))]
pub(crate) fn set_system_message(context: &str, code: u32, text: Option<&[u16]>) {
	if code == 0 {
		set_str(context);
		return;
	}
	match text.map(trim_line_breaks) {
		Some(text) if !text.is_empty() => set_fmt(format_args!("{context}: {}", Utf16(text))),
		_ => set_fmt(format_args!("{context} (error {code})")),
	}
}

#[cfg(any(windows, test))]
fn trim_line_breaks(mut text: &[u16]) -> &[u16] {
	while let [rest @ .., last] = text {
		if *last == u16::from(b'\r') || *last == u16::from(b'\n') {
			text = rest;
		} else {
			break;
		}
	}
	text
}

#[cfg(any(windows, test))]
struct Utf16<'a>(&'a [u16]);

#[cfg(any(windows, test))]
impl fmt::Display for Utf16<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		char::decode_utf16(self.0.iter().copied())
			.map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
			.try_for_each(|c| f.write_char(c))
	}
}
