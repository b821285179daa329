// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::c_void;
use std::mem::{self, size_of};
use std::panic::{self, AssertUnwindSafe};
use std::{fmt, slice};

use libffi::low::ffi_cif;
use libffi::middle::Closure;

use super::{CType, Signature, Value};
use crate::{Error, ErrorKind, Result};

type Handler = Box<dyn FnMut(&[Value]) -> Value>;

struct CallbackData {
	signature: Signature,
	handler: Handler,
}

impl CallbackData {
	unsafe fn read_args(&self, args: *const *const c_void) -> Vec<Value> {
		self.signature
			.args()
			.iter()
			.enumerate()
			.map(|(index, ty)| {
				let arg = *args.add(index);
				Value::from_bytes(ty, slice::from_raw_parts(arg.cast::<u8>(), ty.size_of()))
			})
			.collect()
	}
}

/// A Rust closure exposed as a native function pointer.
///
/// The pointer stays valid for as long as the `Callback` lives. Arguments arrive as [`Value`]s of
/// the declared types and the closure's result is converted to the declared result type. A
/// closure that panics, or returns something that does not convert, makes the native caller see
/// zero.
pub struct Callback {
	closure: Option<Closure<'static>>,
	data: *mut CallbackData,
}

impl Callback {
	/// Wraps `handler` behind a native entry point described by `signature`.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Descriptor`] error for variadic signatures and for signatures that
	/// pass or return aggregates.
	pub fn new<F>(signature: Signature, handler: F) -> Result<Self>
	where
		F: FnMut(&[Value]) -> Value + 'static,
	{
		if signature.is_variadic() {
			return Err(Error::new(
				ErrorKind::Descriptor,
				"variadic callbacks are not supported",
			));
		}
		let aggregate = |ty: &CType| ty.layout().is_some();
		if aggregate(signature.result()) || signature.args().iter().any(aggregate) {
			return Err(Error::new(
				ErrorKind::Descriptor,
				"callbacks cannot pass aggregates by value",
			));
		}

		let cif = signature.build_cif()?;
		let data = Box::into_raw(Box::new(CallbackData {
			signature,
			handler: Box::new(handler),
		}));
		let closure = Closure::new_mut(cif, trampoline, unsafe { &mut *data });
		Ok(Self {
			closure: Some(closure),
			data,
		})
	}

	#[inline]
	pub fn signature(&self) -> &Signature {
		unsafe { &(*self.data).signature }
	}

	/// The native entry point.
	pub fn code_ptr(&self) -> *const c_void {
		match &self.closure {
			Some(closure) => *closure.code_ptr() as *const c_void,
			None => std::ptr::null(),
		}
	}

	/// Reinterprets the entry point as a function pointer type `F`.
	///
	/// # Safety
	///
	/// `F` must match the signature the callback was built with, and must not be called after
	/// the callback is dropped.
	///
	/// # Panics
	///
	/// Panics if `F` is not pointer sized.
	pub unsafe fn as_fn<F: Copy>(&self) -> F {
		assert_eq!(size_of::<F>(), size_of::<*const c_void>());
		let code = self.code_ptr();
		mem::transmute_copy(&code)
	}
}

impl fmt::Debug for Callback {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callback")
			.field("code", &self.code_ptr())
			.field("signature", self.signature())
			.finish()
	}
}

impl Drop for Callback {
	fn drop(&mut self) {
		// the closure borrows the data, so it goes first
		drop(self.closure.take());
		if !self.data.is_null() {
			drop(unsafe { Box::from_raw(self.data) });
		}
	}
}

unsafe extern "C" fn trampoline(
	_cif: &ffi_cif,
	result: &mut u64,
	args: *const *const c_void,
	data: &mut CallbackData,
) {
	let ty = data.signature.result().clone();
	if ty.is_void() {
		invoke(data, args);
		return;
	}

	// libffi hands out a slot of at least one register, or the result's own size if larger
	let len = ty.size_of().max(size_of::<usize>());
	let out = slice::from_raw_parts_mut((result as *mut u64).cast::<u8>(), len);
	out.fill(0);

	let Some(value) = invoke(data, args) else {
		return;
	};
	match value.coerce(&ty) {
		Ok(value) => value.write_return(&ty, out),
		Err(err) => tracing::warn!(%err, "callback returned a mismatched value"),
	}
}

unsafe fn invoke(data: &mut CallbackData, args: *const *const c_void) -> Option<Value> {
	let values = data.read_args(args);
	let handler = &mut data.handler;
	match panic::catch_unwind(AssertUnwindSafe(|| handler(&values))) {
		Ok(value) => Some(value),
		Err(_) => {
			tracing::warn!("callback panicked; returning zero to the native caller");
			None
		}
	}
}
