// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::c_void;
use std::mem::size_of;
use std::slice;

use libffi::middle::CodePtr;
use libffi::raw;

use super::{Signature, Value};
use crate::{Error, ErrorKind, Result, Symbol};

// Word-aligned scratch storage, large enough for any argument or result the descriptors allow.
fn words(len: usize) -> Vec<u64> {
	vec![0; len.div_ceil(size_of::<u64>()).max(1)]
}

fn as_bytes(words: &[u64]) -> &[u8] {
	unsafe { slice::from_raw_parts(words.as_ptr().cast(), words.len() * size_of::<u64>()) }
}

fn as_bytes_mut(words: &mut [u64]) -> &mut [u8] {
	unsafe { slice::from_raw_parts_mut(words.as_mut_ptr().cast(), words.len() * size_of::<u64>()) }
}

impl Signature {
	/// Calls the function at `code` with `args`, converting each to its declared type first.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Argument`] error if `code` is null, if the argument count differs
	/// from the signature, or if an argument cannot be converted.
	///
	/// # Safety
	///
	/// `code` must be a function whose real signature and calling convention match `self`, and
	/// any pointer arguments must satisfy whatever that function expects of them.
	pub unsafe fn call(&self, code: *const c_void, args: &[Value]) -> Result<Value> {
		if code.is_null() {
			return Err(Error::new(ErrorKind::Argument, "function address is null"));
		}
		if args.len() != self.args().len() {
			return Err(Error::new(
				ErrorKind::Argument,
				format!(
					"function expected {} argument(s) but received {}",
					self.args().len(),
					args.len()
				),
			));
		}

		let mut storage = Vec::with_capacity(args.len());
		for (index, (ty, value)) in self.args().iter().zip(args).enumerate() {
			let value = value.clone().coerce(ty).map_err(|err| {
				Error::new(ErrorKind::Argument, format!("argument {index}: {}", err.message()))
			})?;
			let mut slot = words(ty.size_of());
			value.write_bytes(as_bytes_mut(&mut slot));
			storage.push(slot);
		}
		let mut arg_ptrs: Vec<*mut c_void> = storage.iter_mut().map(|slot| slot.as_mut_ptr().cast()).collect();

		let cif = self.build_cif()?;
		let mut ret = words(self.result().size_of().max(size_of::<usize>()));
		let code = CodePtr::from_ptr(code);
		tracing::trace!(args = args.len(), variadic = self.is_variadic(), "ffi_call");
		raw::ffi_call(
			cif.as_raw_ptr(),
			Some(*code.as_safe_fun()),
			ret.as_mut_ptr().cast(),
			arg_ptrs.as_mut_ptr(),
		);

		Ok(Value::from_return(self.result(), as_bytes(&ret)))
	}

	/// Calls a resolved symbol. See [`call`](Self::call).
	///
	/// # Safety
	///
	/// The same contract as [`call`](Self::call).
	#[inline]
	pub unsafe fn call_symbol(&self, symbol: Symbol<'_>, args: &[Value]) -> Result<Value> {
		self.call(symbol.as_ptr(), args)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::abi::{CType, TypeCode};

	extern "C" fn scale(value: i16, factor: f64) -> f64 {
		f64::from(value) * factor
	}

	extern "C" fn negate(value: i8) -> i8 {
		value.wrapping_neg()
	}

	#[test]
	fn test_call_rust_function() {
		let sig = Signature::new(
			CType::from(TypeCode::Float64),
			vec![CType::from(TypeCode::Int16), CType::from(TypeCode::Float64)],
		)
		.unwrap();
		let out = unsafe { sig.call(scale as *const c_void, &[Value::I32(-4), Value::F64(0.5)]) }.unwrap();
		assert_eq!(out, Value::F64(-2.0));
	}

	#[test]
	fn test_narrow_result() {
		let int8 = CType::from(TypeCode::Int8);
		let sig = Signature::new(int8.clone(), vec![int8]).unwrap();
		let out = unsafe { sig.call(negate as *const c_void, &[Value::I8(5)]) }.unwrap();
		assert_eq!(out, Value::I8(-5));
	}

	#[test]
	fn test_argument_errors() {
		let int8 = CType::from(TypeCode::Int8);
		let sig = Signature::new(int8.clone(), vec![int8]).unwrap();
		let err = unsafe { sig.call(std::ptr::null(), &[Value::I8(1)]) }.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		let err = unsafe { sig.call(negate as *const c_void, &[]) }.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		let err = unsafe { sig.call(negate as *const c_void, &[Value::I32(1000)]) }.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		assert!(err.message().starts_with("argument 0:"));
	}
}
