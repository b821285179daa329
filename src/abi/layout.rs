// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use libffi::middle::Type;

use super::{CType, TypeCode, Value};
use crate::{Error, ErrorKind, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutKind {
	Struct,
	Union,
}

/// The memory layout of a fixed-layout aggregate: field types, offsets, size and alignment, as a
/// C compiler for the target would lay them out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
	kind: LayoutKind,
	fields: Vec<CType>,
	offsets: Vec<usize>,
	size: usize,
	align: usize,
}

#[inline]
const fn align_up(offset: usize, align: usize) -> usize {
	(offset + align - 1) & !(align - 1)
}

impl Layout {
	/// Computes the layout of `fields`.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Descriptor`] error if `fields` is empty or contains `void`.
	pub fn new(kind: LayoutKind, fields: Vec<CType>) -> Result<Self> {
		if fields.is_empty() {
			return Err(Error::new(
				ErrorKind::Descriptor,
				"an aggregate needs at least one field",
			));
		}
		if let Some(index) = fields.iter().position(CType::is_void) {
			return Err(Error::new(
				ErrorKind::Descriptor,
				format!("field {index} of an aggregate cannot be void"),
			));
		}

		let align = fields.iter().map(CType::align_of).max().unwrap_or(1);
		let (offsets, end) = match kind {
			LayoutKind::Struct => {
				let mut offsets = Vec::with_capacity(fields.len());
				let mut offset = 0;
				for field in &fields {
					offset = align_up(offset, field.align_of());
					offsets.push(offset);
					offset += field.size_of();
				}
				(offsets, offset)
			}
			LayoutKind::Union => {
				let end = fields.iter().map(CType::size_of).max().unwrap_or(0);
				(vec![0; fields.len()], end)
			}
		};

		Ok(Self {
			kind,
			fields,
			offsets,
			size: align_up(end, align),
			align,
		})
	}

	#[inline]
	pub fn kind(&self) -> LayoutKind {
		self.kind
	}

	#[inline]
	pub fn fields(&self) -> &[CType] {
		&self.fields
	}

	#[inline]
	pub fn offsets(&self) -> &[usize] {
		&self.offsets
	}

	#[inline]
	pub fn offset_of(&self, index: usize) -> Option<usize> {
		self.offsets.get(index).copied()
	}

	/// Total size in bytes, trailing padding included.
	#[inline]
	pub fn size(&self) -> usize {
		self.size
	}

	#[inline]
	pub fn align(&self) -> usize {
		self.align
	}

	/// A zero-filled buffer the size of the aggregate.
	#[inline]
	pub fn zeroed(&self) -> Vec<u8> {
		vec![0; self.size]
	}

	fn field(&self, index: usize) -> Result<(&CType, usize)> {
		match (self.fields.get(index), self.offsets.get(index)) {
			(Some(ty), Some(&offset)) => Ok((ty, offset)),
			_ => Err(Error::new(
				ErrorKind::Argument,
				format!("field {index} out of range for an aggregate of {} fields", self.fields.len()),
			)),
		}
	}

	fn check_len(&self, len: usize) -> Result<()> {
		if len == self.size {
			Ok(())
		} else {
			Err(Error::new(
				ErrorKind::Argument,
				format!("aggregate of {} bytes given a buffer of {len} bytes", self.size),
			))
		}
	}

	/// Reads field `index` out of `bytes`, a buffer holding the whole aggregate.
	pub fn read(&self, bytes: &[u8], index: usize) -> Result<Value> {
		self.check_len(bytes.len())?;
		let (ty, offset) = self.field(index)?;
		Ok(Value::from_bytes(ty, &bytes[offset..offset + ty.size_of()]))
	}

	/// Writes `value` into field `index` of `bytes`, after converting it to the field's type.
	pub fn write(&self, bytes: &mut [u8], index: usize, value: Value) -> Result<()> {
		self.check_len(bytes.len())?;
		let (ty, offset) = self.field(index)?;
		let value = value.coerce(ty)?;
		value.write_bytes(&mut bytes[offset..offset + ty.size_of()]);
		Ok(())
	}

	/// Every primitive inside the aggregate with its byte offset, nested aggregates flattened.
	fn leaves(&self, base: usize, out: &mut Vec<(usize, TypeCode)>) {
		for (field, offset) in self.fields.iter().zip(&self.offsets) {
			match field {
				CType::Primitive(code) => out.push((base + offset, *code)),
				CType::Struct(layout) | CType::Union(layout) => layout.leaves(base + offset, out),
			}
		}
	}

	// libffi has no union type. A union is handed over as a struct built eightbyte by eightbyte:
	// a chunk only some float member overlaps becomes `float`/`double`, any other chunk becomes
	// unsigned integers, so the register class matches what a C compiler picks for the union.
	fn union_members(&self) -> Vec<Type> {
		let mut leaves = Vec::new();
		self.leaves(0, &mut leaves);

		let mut members = Vec::new();
		let mut start = 0;
		while start < self.size {
			let len = (self.size - start).min(EIGHTBYTE);
			let overlapping: Vec<TypeCode> = leaves
				.iter()
				.filter(|(offset, code)| *offset < start + len && offset + code.size_of() > start)
				.map(|&(_, code)| code)
				.collect();
			let float = !overlapping.is_empty()
				&& overlapping.iter().all(|code| matches!(code, TypeCode::Float32 | TypeCode::Float64));
			chunk_members(len, self.align, float, &mut members);
			start += len;
		}
		members
	}

	pub(crate) fn ffi_type(&self) -> Type {
		let members: Vec<Type> = match self.kind {
			LayoutKind::Struct => self.fields.iter().map(CType::ffi_type).collect(),
			LayoutKind::Union => self.union_members(),
		};
		Type::structure(members)
	}
}

const EIGHTBYTE: usize = 8;

// Fills one chunk of `len` bytes. Pieces never exceed the union's alignment, so the lowered struct
// keeps the union's size and alignment.
fn chunk_members(len: usize, align: usize, float: bool, out: &mut Vec<Type>) {
	if float {
		match len {
			8 if TypeCode::Float64.align_of() <= align => return out.push(TypeCode::Float64.ffi_type()),
			8 => return out.extend([TypeCode::Float32.ffi_type(), TypeCode::Float32.ffi_type()]),
			4 => return out.push(TypeCode::Float32.ffi_type()),
			_ => {}
		}
	}
	let mut remaining = len;
	while remaining > 0 {
		let mut piece = align.clamp(1, EIGHTBYTE);
		while piece > remaining {
			piece /= 2;
		}
		out.push(unsigned_of(piece).ffi_type());
		remaining -= piece;
	}
}

fn unsigned_of(size: usize) -> TypeCode {
	match size {
		8 => TypeCode::UInt64,
		4 => TypeCode::UInt32,
		2 => TypeCode::UInt16,
		_ => TypeCode::UInt8,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::mem::{align_of, size_of};

	fn prim(code: TypeCode) -> CType {
		CType::from(code)
	}

	#[repr(C)]
	struct Mixed {
		a: u8,
		b: i32,
		c: u16,
		d: f64,
		e: u8,
	}

	#[test]
	fn test_struct_padding_matches_repr_c() {
		let layout = Layout::new(
			LayoutKind::Struct,
			vec![
				prim(TypeCode::UInt8),
				prim(TypeCode::Int32),
				prim(TypeCode::UInt16),
				prim(TypeCode::Float64),
				prim(TypeCode::UInt8),
			],
		)
		.unwrap();
		assert_eq!(layout.size(), size_of::<Mixed>());
		assert_eq!(layout.align(), align_of::<Mixed>());
		assert_eq!(layout.offset_of(1), Some(4));
		assert_eq!(layout.offset_of(2), Some(8));
		assert_eq!(layout.offset_of(3), Some(align_up(10, align_of::<f64>())));
		assert_eq!(layout.offset_of(5), None);
	}

	#[test]
	fn test_union_layout() {
		let layout = Layout::new(
			LayoutKind::Union,
			vec![prim(TypeCode::UInt8), prim(TypeCode::Int32), prim(TypeCode::UInt16)],
		)
		.unwrap();
		assert_eq!(layout.size(), 4);
		assert_eq!(layout.align(), 4);
		assert!(layout.offsets().iter().all(|&o| o == 0));
	}

	#[test]
	fn test_nested_struct() {
		let inner = CType::structure([prim(TypeCode::UInt8), prim(TypeCode::UInt16)]).unwrap();
		let outer = Layout::new(LayoutKind::Struct, vec![prim(TypeCode::UInt8), inner]).unwrap();
		assert_eq!(outer.offset_of(1), Some(2));
		assert_eq!(outer.size(), 6);
		assert_eq!(outer.align(), 2);
	}

	#[test]
	fn test_rejects_empty_and_void() {
		let err = Layout::new(LayoutKind::Struct, vec![]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Descriptor);
		let err = Layout::new(LayoutKind::Union, vec![prim(TypeCode::Int32), prim(TypeCode::Void)]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Descriptor);
	}

	#[test]
	fn test_read_write_fields() {
		let layout = Layout::new(LayoutKind::Struct, vec![prim(TypeCode::Int32), prim(TypeCode::Float64)]).unwrap();
		let mut bytes = layout.zeroed();
		layout.write(&mut bytes, 0, Value::I64(-7)).unwrap();
		layout.write(&mut bytes, 1, Value::F64(2.5)).unwrap();
		assert_eq!(layout.read(&bytes, 0).unwrap(), Value::I32(-7));
		assert_eq!(layout.read(&bytes, 1).unwrap(), Value::F64(2.5));

		let err = layout.write(&mut bytes, 0, Value::I64(i64::MAX)).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
		let err = layout.read(&bytes[..4], 0).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Argument);
	}
}
