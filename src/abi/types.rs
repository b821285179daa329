// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::c_void;
use std::fmt;
use std::mem::{align_of, size_of};
use std::str::FromStr;
use std::sync::Arc;

use libffi::middle::Type;

use super::layout::{Layout, LayoutKind};
use crate::{Error, ErrorKind, Result};

/// A primitive native type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
	Void,
	Int8,
	UInt8,
	Int16,
	UInt16,
	Int32,
	UInt32,
	Int64,
	UInt64,
	IntPtr,
	UIntPtr,
	Float32,
	Float64,
	Pointer,
}

impl TypeCode {
	/// Parses a C-ish type name. Names are trimmed and matched case-insensitively; `long` and
	/// `unsigned long` follow the target's C data model.
	pub fn from_name(name: &str) -> Result<Self> {
		let name = name.trim().to_ascii_lowercase();
		let code = match name.as_str() {
			"void" => TypeCode::Void,
			"int8" | "sint8" | "signed char" => TypeCode::Int8,
			"uint8" | "unsigned char" | "bool" => TypeCode::UInt8,
			"int16" | "sint16" | "short" => TypeCode::Int16,
			"uint16" | "unsigned short" => TypeCode::UInt16,
			"int32" | "sint32" | "int" => TypeCode::Int32,
			"uint32" | "unsigned int" | "unsigned" => TypeCode::UInt32,
			"int64" | "sint64" | "long long" => TypeCode::Int64,
			"uint64" | "unsigned long long" => TypeCode::UInt64,
			"long" => {
				if cfg!(target_pointer_width = "64") && !cfg!(windows) {
					TypeCode::Int64
				} else {
					TypeCode::Int32
				}
			}
			"unsigned long" => {
				if cfg!(target_pointer_width = "64") && !cfg!(windows) {
					TypeCode::UInt64
				} else {
					TypeCode::UInt32
				}
			}
			"ssize_t" | "intptr" | "intptr_t" | "ptrdiff_t" => TypeCode::IntPtr,
			"size_t" | "uintptr" | "uintptr_t" => TypeCode::UIntPtr,
			"float" => TypeCode::Float32,
			"double" => TypeCode::Float64,
			"pointer" | "void*" | "void *" => TypeCode::Pointer,
			_ => {
				return Err(Error::new(
					ErrorKind::Descriptor,
					format!("unsupported primitive type '{name}'"),
				))
			}
		};
		Ok(code)
	}

	pub const fn size_of(self) -> usize {
		match self {
			TypeCode::Void => 0,
			TypeCode::Int8 | TypeCode::UInt8 => size_of::<i8>(),
			TypeCode::Int16 | TypeCode::UInt16 => size_of::<i16>(),
			TypeCode::Int32 | TypeCode::UInt32 => size_of::<i32>(),
			TypeCode::Int64 | TypeCode::UInt64 => size_of::<i64>(),
			TypeCode::IntPtr | TypeCode::UIntPtr | TypeCode::Pointer => size_of::<*mut c_void>(),
			TypeCode::Float32 => size_of::<f32>(),
			TypeCode::Float64 => size_of::<f64>(),
		}
	}

	pub const fn align_of(self) -> usize {
		match self {
			TypeCode::Void => 1,
			TypeCode::Int8 | TypeCode::UInt8 => align_of::<i8>(),
			TypeCode::Int16 | TypeCode::UInt16 => align_of::<i16>(),
			TypeCode::Int32 | TypeCode::UInt32 => align_of::<i32>(),
			TypeCode::Int64 | TypeCode::UInt64 => align_of::<i64>(),
			TypeCode::IntPtr | TypeCode::UIntPtr | TypeCode::Pointer => align_of::<*mut c_void>(),
			TypeCode::Float32 => align_of::<f32>(),
			TypeCode::Float64 => align_of::<f64>(),
		}
	}

	#[inline]
	pub const fn is_integer(self) -> bool {
		!matches!(
			self,
			TypeCode::Void | TypeCode::Float32 | TypeCode::Float64 | TypeCode::Pointer
		)
	}

	#[inline]
	pub const fn is_signed(self) -> bool {
		matches!(
			self,
			TypeCode::Int8 | TypeCode::Int16 | TypeCode::Int32 | TypeCode::Int64 | TypeCode::IntPtr
		)
	}

	/// The canonical name, as accepted by [`from_name`](Self::from_name).
	pub const fn name(self) -> &'static str {
		match self {
			TypeCode::Void => "void",
			TypeCode::Int8 => "int8",
			TypeCode::UInt8 => "uint8",
			TypeCode::Int16 => "int16",
			TypeCode::UInt16 => "uint16",
			TypeCode::Int32 => "int32",
			TypeCode::UInt32 => "uint32",
			TypeCode::Int64 => "int64",
			TypeCode::UInt64 => "uint64",
			TypeCode::IntPtr => "intptr",
			TypeCode::UIntPtr => "uintptr",
			TypeCode::Float32 => "float",
			TypeCode::Float64 => "double",
			TypeCode::Pointer => "pointer",
		}
	}

	pub(crate) fn ffi_type(self) -> Type {
		match self {
			TypeCode::Void => Type::void(),
			TypeCode::Int8 => Type::i8(),
			TypeCode::UInt8 => Type::u8(),
			TypeCode::Int16 => Type::i16(),
			TypeCode::UInt16 => Type::u16(),
			TypeCode::Int32 => Type::i32(),
			TypeCode::UInt32 => Type::u32(),
			TypeCode::Int64 => Type::i64(),
			TypeCode::UInt64 => Type::u64(),
			TypeCode::IntPtr => Type::isize(),
			TypeCode::UIntPtr => Type::usize(),
			TypeCode::Float32 => Type::f32(),
			TypeCode::Float64 => Type::f64(),
			TypeCode::Pointer => Type::pointer(),
		}
	}
}

impl fmt::Display for TypeCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for TypeCode {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::from_name(s)
	}
}

/// A native type: a primitive, or a fixed-layout aggregate passed by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CType {
	Primitive(TypeCode),
	Struct(Arc<Layout>),
	Union(Arc<Layout>),
}

impl CType {
	/// A struct of `fields`, laid out by C rules.
	pub fn structure(fields: impl IntoIterator<Item = CType>) -> Result<Self> {
		Layout::new(LayoutKind::Struct, fields.into_iter().collect()).map(|l| CType::Struct(Arc::new(l)))
	}

	/// A union of `fields`; every member starts at offset zero.
	pub fn union(fields: impl IntoIterator<Item = CType>) -> Result<Self> {
		Layout::new(LayoutKind::Union, fields.into_iter().collect()).map(|l| CType::Union(Arc::new(l)))
	}

	pub fn size_of(&self) -> usize {
		match self {
			CType::Primitive(code) => code.size_of(),
			CType::Struct(layout) | CType::Union(layout) => layout.size(),
		}
	}

	pub fn align_of(&self) -> usize {
		match self {
			CType::Primitive(code) => code.align_of(),
			CType::Struct(layout) | CType::Union(layout) => layout.align(),
		}
	}

	/// The primitive code, or `None` for aggregates.
	#[inline]
	pub fn code(&self) -> Option<TypeCode> {
		match self {
			CType::Primitive(code) => Some(*code),
			_ => None,
		}
	}

	/// The aggregate layout, or `None` for primitives.
	#[inline]
	pub fn layout(&self) -> Option<&Layout> {
		match self {
			CType::Primitive(_) => None,
			CType::Struct(layout) | CType::Union(layout) => Some(layout),
		}
	}

	#[inline]
	pub fn is_void(&self) -> bool {
		matches!(self, CType::Primitive(TypeCode::Void))
	}

	pub(crate) fn ffi_type(&self) -> Type {
		match self {
			CType::Primitive(code) => code.ffi_type(),
			CType::Struct(layout) | CType::Union(layout) => layout.ffi_type(),
		}
	}
}

impl From<TypeCode> for CType {
	#[inline]
	fn from(code: TypeCode) -> Self {
		CType::Primitive(code)
	}
}

impl FromStr for CType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		TypeCode::from_name(s).map(CType::Primitive)
	}
}
