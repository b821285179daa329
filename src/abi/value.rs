// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use super::{CType, TypeCode};
use crate::{Error, ErrorKind, Result};

/// A native value crossing a dynamic call.
///
/// Arguments are converted to the declared parameter type before the call, so an `I64` can be
/// passed for an `int32` parameter as long as it fits.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Void,
	I8(i8),
	U8(u8),
	I16(i16),
	U16(u16),
	I32(i32),
	U32(u32),
	I64(i64),
	U64(u64),
	IntPtr(isize),
	UIntPtr(usize),
	F32(f32),
	F64(f64),
	Pointer(*mut c_void),
	/// The raw bytes of a struct or union, exactly its layout's size.
	Aggregate(Vec<u8>),
}

macro_rules! impl_from {
	($($ty:ty => $variant:ident),* $(,)?) => {
		$(
			impl From<$ty> for Value {
				#[inline]
				fn from(value: $ty) -> Self {
					Value::$variant(value)
				}
			}
		)*
	};
}

impl_from! {
	i8 => I8,
	u8 => U8,
	i16 => I16,
	u16 => U16,
	i32 => I32,
	u32 => U32,
	i64 => I64,
	u64 => U64,
	isize => IntPtr,
	usize => UIntPtr,
	f32 => F32,
	f64 => F64,
	*mut c_void => Pointer,
}

impl From<*const c_void> for Value {
	#[inline]
	fn from(value: *const c_void) -> Self {
		Value::Pointer(value.cast_mut())
	}
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
	let mut out = [0u8; N];
	let len = N.min(bytes.len());
	out[..len].copy_from_slice(&bytes[..len]);
	out
}

impl Value {
	/// The value as an integer, for any integer variant.
	pub fn as_integer(&self) -> Option<i128> {
		Some(match *self {
			Value::I8(v) => v.into(),
			Value::U8(v) => v.into(),
			Value::I16(v) => v.into(),
			Value::U16(v) => v.into(),
			Value::I32(v) => v.into(),
			Value::U32(v) => v.into(),
			Value::I64(v) => v.into(),
			Value::U64(v) => v.into(),
			Value::IntPtr(v) => v as i128,
			Value::UIntPtr(v) => v as i128,
			_ => return None,
		})
	}

	/// The value as a double, for floating point and integer variants.
	pub fn as_f64(&self) -> Option<f64> {
		match *self {
			Value::F32(v) => Some(v.into()),
			Value::F64(v) => Some(v),
			_ => self.as_integer().map(|v| v as f64),
		}
	}

	/// The value as an address, for pointers and pointer sized integers.
	pub fn as_ptr(&self) -> Option<*mut c_void> {
		match *self {
			Value::Pointer(p) => Some(p),
			Value::IntPtr(v) => Some(v as *mut c_void),
			Value::UIntPtr(v) => Some(v as *mut c_void),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Value::Aggregate(bytes) => Some(bytes),
			_ => None,
		}
	}

	fn variant_name(&self) -> &'static str {
		match self {
			Value::Void => "void",
			Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) | Value::IntPtr(_) => "signed integer",
			Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) | Value::UIntPtr(_) => "unsigned integer",
			Value::F32(_) | Value::F64(_) => "float",
			Value::Pointer(_) => "pointer",
			Value::Aggregate(_) => "aggregate",
		}
	}

	fn mismatch(&self, ty: impl std::fmt::Display) -> Error {
		Error::new(
			ErrorKind::Argument,
			format!("cannot pass a {} as {ty}", self.variant_name()),
		)
	}

	fn integer_to(code: TypeCode, v: i128) -> Result<Value> {
		macro_rules! narrow {
			($variant:ident) => {
				v.try_into().map(Value::$variant).map_err(|_| {
					Error::new(ErrorKind::Argument, format!("{v} is out of range for {code}"))
				})
			};
		}
		match code {
			TypeCode::Int8 => narrow!(I8),
			TypeCode::UInt8 => narrow!(U8),
			TypeCode::Int16 => narrow!(I16),
			TypeCode::UInt16 => narrow!(U16),
			TypeCode::Int32 => narrow!(I32),
			TypeCode::UInt32 => narrow!(U32),
			TypeCode::Int64 => narrow!(I64),
			TypeCode::UInt64 => narrow!(U64),
			TypeCode::IntPtr => narrow!(IntPtr),
			TypeCode::UIntPtr => narrow!(UIntPtr),
			_ => Err(Error::new(ErrorKind::Argument, format!("{code} is not an integer type"))),
		}
	}

	/// Converts the value to `ty`.
	///
	/// Integers convert to any integer type they fit in, and to floats. Floats convert between
	/// widths but never silently to integers. Pointer sized integers convert to pointers.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Argument`] error when the value cannot represent `ty`.
	pub fn coerce(self, ty: &CType) -> Result<Value> {
		match ty {
			CType::Primitive(code) => match code {
				TypeCode::Void => match self {
					Value::Void => Ok(Value::Void),
					other => Err(other.mismatch(code)),
				},
				TypeCode::Float32 => match self.as_f64() {
					Some(v) => Ok(Value::F32(v as f32)),
					None => Err(self.mismatch(code)),
				},
				TypeCode::Float64 => match self.as_f64() {
					Some(v) => Ok(Value::F64(v)),
					None => Err(self.mismatch(code)),
				},
				TypeCode::Pointer => match self.as_ptr() {
					Some(p) => Ok(Value::Pointer(p)),
					None => Err(self.mismatch(code)),
				},
				code => match self.as_integer() {
					Some(v) => Self::integer_to(*code, v),
					None => Err(self.mismatch(code)),
				},
			},
			CType::Struct(layout) | CType::Union(layout) => match self {
				Value::Aggregate(bytes) if bytes.len() == layout.size() => Ok(Value::Aggregate(bytes)),
				Value::Aggregate(bytes) => Err(Error::new(
					ErrorKind::Argument,
					format!("aggregate of {} bytes given {} bytes", layout.size(), bytes.len()),
				)),
				other => Err(other.mismatch("an aggregate")),
			},
		}
	}

	/// Writes the value's native representation to the front of `out`.
	pub(crate) fn write_bytes(&self, out: &mut [u8]) {
		macro_rules! put {
			($bytes:expr) => {{
				let bytes = $bytes;
				let len = bytes.len().min(out.len());
				out[..len].copy_from_slice(&bytes[..len]);
			}};
		}
		match self {
			Value::Void => {}
			Value::I8(v) => put!(v.to_ne_bytes()),
			Value::U8(v) => put!(v.to_ne_bytes()),
			Value::I16(v) => put!(v.to_ne_bytes()),
			Value::U16(v) => put!(v.to_ne_bytes()),
			Value::I32(v) => put!(v.to_ne_bytes()),
			Value::U32(v) => put!(v.to_ne_bytes()),
			Value::I64(v) => put!(v.to_ne_bytes()),
			Value::U64(v) => put!(v.to_ne_bytes()),
			Value::IntPtr(v) => put!(v.to_ne_bytes()),
			Value::UIntPtr(v) => put!(v.to_ne_bytes()),
			Value::F32(v) => put!(v.to_ne_bytes()),
			Value::F64(v) => put!(v.to_ne_bytes()),
			Value::Pointer(p) => put!((*p as usize).to_ne_bytes()),
			Value::Aggregate(bytes) => put!(bytes.as_slice()),
		}
	}

	/// Reads a value of type `ty` from the front of `bytes`.
	pub(crate) fn from_bytes(ty: &CType, bytes: &[u8]) -> Value {
		let code = match ty {
			CType::Primitive(code) => *code,
			CType::Struct(layout) | CType::Union(layout) => {
				let len = layout.size().min(bytes.len());
				return Value::Aggregate(bytes[..len].to_vec());
			}
		};
		match code {
			TypeCode::Void => Value::Void,
			TypeCode::Int8 => Value::I8(i8::from_ne_bytes(array(bytes))),
			TypeCode::UInt8 => Value::U8(u8::from_ne_bytes(array(bytes))),
			TypeCode::Int16 => Value::I16(i16::from_ne_bytes(array(bytes))),
			TypeCode::UInt16 => Value::U16(u16::from_ne_bytes(array(bytes))),
			TypeCode::Int32 => Value::I32(i32::from_ne_bytes(array(bytes))),
			TypeCode::UInt32 => Value::U32(u32::from_ne_bytes(array(bytes))),
			TypeCode::Int64 => Value::I64(i64::from_ne_bytes(array(bytes))),
			TypeCode::UInt64 => Value::U64(u64::from_ne_bytes(array(bytes))),
			TypeCode::IntPtr => Value::IntPtr(isize::from_ne_bytes(array(bytes))),
			TypeCode::UIntPtr => Value::UIntPtr(usize::from_ne_bytes(array(bytes))),
			TypeCode::Float32 => Value::F32(f32::from_ne_bytes(array(bytes))),
			TypeCode::Float64 => Value::F64(f64::from_ne_bytes(array(bytes))),
			TypeCode::Pointer => Value::Pointer(usize::from_ne_bytes(array(bytes)) as *mut c_void),
		}
	}

	// libffi widens integer results narrower than a register to a full `ffi_arg`, in both
	// directions. The two helpers below read and write that widened slot.

	fn is_widened(ty: &CType) -> bool {
		matches!(ty.code(), Some(code) if code.is_integer() && code.size_of() < size_of::<usize>())
	}

	/// Reads a call result of type `ty` out of libffi's return buffer.
	pub(crate) fn from_return(ty: &CType, buf: &[u8]) -> Value {
		if !Self::is_widened(ty) {
			return Self::from_bytes(ty, buf);
		}
		let raw = usize::from_ne_bytes(array(buf));
		match ty.code() {
			Some(TypeCode::Int8) => Value::I8(raw as i8),
			Some(TypeCode::UInt8) => Value::U8(raw as u8),
			Some(TypeCode::Int16) => Value::I16(raw as i16),
			Some(TypeCode::UInt16) => Value::U16(raw as u16),
			Some(TypeCode::Int32) => Value::I32(raw as i32),
			Some(TypeCode::UInt32) => Value::U32(raw as u32),
			_ => Self::from_bytes(ty, buf),
		}
	}

	/// Writes a callback result into libffi's return buffer, widening narrow integers.
	pub(crate) fn write_return(&self, ty: &CType, out: &mut [u8]) {
		if !Self::is_widened(ty) {
			self.write_bytes(out);
			return;
		}
		let widened = match self.as_integer() {
			Some(v) if ty.code().is_some_and(TypeCode::is_signed) => v as isize as usize,
			Some(v) => v as usize,
			None => 0,
		};
		Value::UIntPtr(widened).write_bytes(out);
	}

	/// A null pointer.
	#[inline]
	pub fn null() -> Value {
		Value::Pointer(ptr::null_mut())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn prim(code: TypeCode) -> CType {
		CType::from(code)
	}

	#[test]
	fn test_integer_coercion() {
		assert_eq!(Value::I64(200).coerce(&prim(TypeCode::UInt8)).unwrap(), Value::U8(200));
		assert_eq!(Value::U8(7).coerce(&prim(TypeCode::Int64)).unwrap(), Value::I64(7));
		let err = Value::I32(-1).coerce(&prim(TypeCode::UInt32)).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		let err = Value::U64(u64::MAX).coerce(&prim(TypeCode::Int64)).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
	}

	#[test]
	fn test_float_coercion() {
		assert_eq!(Value::I32(3).coerce(&prim(TypeCode::Float64)).unwrap(), Value::F64(3.0));
		assert_eq!(Value::F64(0.5).coerce(&prim(TypeCode::Float32)).unwrap(), Value::F32(0.5));
		assert!(Value::F64(1.0).coerce(&prim(TypeCode::Int32)).is_err());
	}

	#[test]
	fn test_pointer_coercion() {
		assert_eq!(Value::UIntPtr(0).coerce(&prim(TypeCode::Pointer)).unwrap(), Value::null());
		assert!(Value::I32(1).coerce(&prim(TypeCode::Pointer)).is_err());
		assert!(Value::null().coerce(&prim(TypeCode::Int32)).is_err());
	}

	#[test]
	fn test_aggregate_coercion() {
		let pair = CType::structure([prim(TypeCode::Int32), prim(TypeCode::Int32)]).unwrap();
		assert!(Value::Aggregate(vec![0; 8]).coerce(&pair).is_ok());
		let err = Value::Aggregate(vec![0; 4]).coerce(&pair).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		assert!(Value::I64(0).coerce(&pair).is_err());
	}

	#[test]
	fn test_widened_return_slot() {
		let ty = prim(TypeCode::Int8);
		let mut slot = [0u8; 8];
		Value::I8(-3).write_return(&ty, &mut slot);
		assert_eq!(usize::from_ne_bytes(array(&slot)), -3isize as usize);
		assert_eq!(Value::from_return(&ty, &slot), Value::I8(-3));

		let ty = prim(TypeCode::UInt16);
		Value::U16(0xBEEF).write_return(&ty, &mut slot);
		assert_eq!(Value::from_return(&ty, &slot), Value::U16(0xBEEF));
	}
}
