// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use libffi::middle::CodePtr;

use crate::Library;

/// The address of an exported symbol, valid for as long as its [`Library`] is borrowed.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(transparent)]
pub struct Symbol<'a>(NonNull<ffi::c_void>, PhantomData<&'a Library>);

// the address itself is immutable, and the borrow keeps the library loaded
unsafe impl Send for Symbol<'_> {}
unsafe impl Sync for Symbol<'_> {}

impl<'a> Symbol<'a> {
	#[inline]
	pub(crate) const fn new(addr: NonNull<ffi::c_void>) -> Self {
		Self(addr, PhantomData)
	}

	/// Casts to a pointer of another type.
	#[inline]
	pub const fn cast<T>(self) -> *mut T {
		self.0.as_ptr().cast()
	}

	#[inline]
	pub const fn as_ptr(self) -> *mut ffi::c_void {
		self.0.as_ptr()
	}

	/// The address as a libffi code pointer, for calls built outside [`abi`](crate::abi).
	#[inline]
	pub fn code_ptr(self) -> CodePtr {
		CodePtr::from_ptr(self.0.as_ptr().cast_const())
	}

	/// Reinterprets the address as a function pointer type `F`.
	///
	/// # Safety
	///
	/// The symbol must be a function whose real signature and calling convention match `F`, and
	/// the result must not be called after the library is released.
	///
	/// # Panics
	///
	/// Panics if `F` is not pointer sized.
	#[inline]
	pub unsafe fn as_fn<F: Copy>(self) -> F {
		assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut ffi::c_void>());
		mem::transmute_copy(&self.0)
	}
}
