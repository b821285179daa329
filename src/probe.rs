// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! Native fixtures for exercising the call bridge.
//!
//! These are compiled from `native/probe.c` into the crate, one function per calling shape the
//! bridge has to get right: plain integers, variadic integer and string arguments, callbacks, a
//! struct with internal padding passed by value, a struct holding a pointer, and a union passed by
//! value. Each has a matching [`CType`] descriptor here.
//!
//! The fixtures are statically linked here and reached through their Rust declarations. The build
//! also produces them as a standalone shared library, whose path is compiled into the crate's tests
//! as `DLBRIDGE_PROBE_LIBRARY`, for opening through [`Library`](crate::Library).

use std::ffi::{c_char, c_int, c_void};

use crate::abi::{CType, TypeCode};
use crate::Result;

/// `struct probe_pair`, padded between its two fields on every common target.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbePair {
	pub id: i32,
	pub weight: f64,
}

impl ProbePair {
	pub fn ctype() -> Result<CType> {
		CType::structure([TypeCode::Int32.into(), TypeCode::Float64.into()])
	}
}

/// `struct probe_ref`, which refers to memory owned by the caller.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeRef {
	pub flag: i32,
	pub value: *const i32,
}

impl ProbeRef {
	pub fn ctype() -> Result<CType> {
		CType::structure([TypeCode::Int32.into(), TypeCode::Pointer.into()])
	}
}

/// `union probe_word`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union ProbeWord {
	pub bits: i64,
	pub ptr: *mut c_void,
}

impl ProbeWord {
	pub fn ctype() -> Result<CType> {
		CType::union([TypeCode::Int64.into(), TypeCode::Pointer.into()])
	}
}

/// `int (*)(int)`, the callback accepted by [`probe_call_callback`].
pub type ProbeUnaryCallback = Option<unsafe extern "C" fn(c_int) -> c_int>;

extern "C" {
	pub fn probe_add_ints(a: c_int, b: c_int) -> c_int;
	/// Sums `count` trailing `int`s.
	pub fn probe_variadic_sum(count: c_int, ...) -> c_int;
	/// `vsnprintf` into `buffer`; `-1` when `buffer` is null or `size` is zero.
	pub fn probe_variadic_format(buffer: *mut c_char, size: usize, fmt: *const c_char, ...) -> c_int;
	/// `cb(value)`, or `-1` when `cb` is null.
	pub fn probe_call_callback(cb: ProbeUnaryCallback, value: c_int) -> c_int;
	pub fn probe_pair_id(pair: ProbePair) -> i32;
	pub fn probe_pair_weight(pair: ProbePair) -> f64;
	pub fn probe_pair_total(pair: ProbePair) -> f64;
	/// `-1` if `r` or its `value` is null, `*value` if `flag` is set, and `0` otherwise.
	pub fn probe_ref_read(r: *const ProbeRef) -> i32;
	pub fn probe_word_bits(word: ProbeWord) -> i64;
	pub fn probe_word_is(word: ProbeWord, expected: *mut c_void) -> c_int;
	/// A static NUL terminated string.
	pub fn probe_greeting() -> *const c_char;
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::mem::{align_of, size_of};

	#[test]
	fn test_descriptors_match_declarations() {
		let pair = ProbePair::ctype().unwrap();
		assert_eq!(pair.size_of(), size_of::<ProbePair>());
		assert_eq!(pair.align_of(), align_of::<ProbePair>());
		let layout = pair.layout().unwrap();
		assert_eq!(layout.offset_of(1), Some(std::mem::offset_of!(ProbePair, weight)));

		let r = ProbeRef::ctype().unwrap();
		assert_eq!(r.size_of(), size_of::<ProbeRef>());

		let word = ProbeWord::ctype().unwrap();
		assert_eq!(word.size_of(), size_of::<ProbeWord>());
		assert_eq!(word.align_of(), align_of::<ProbeWord>());
	}

	#[test]
	fn test_direct_calls() {
		unsafe {
			assert_eq!(probe_add_ints(40, 2), 42);
			assert_eq!(probe_variadic_sum(3, 1 as c_int, 2 as c_int, 3 as c_int), 6);
			assert_eq!(probe_pair_total(ProbePair { id: 2, weight: 0.5 }), 2.5);
			let greeting = std::ffi::CStr::from_ptr(probe_greeting());
			assert_eq!(greeting.to_str().unwrap(), "Hello from the probe bridge");
		}
	}
}
