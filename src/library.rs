// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi::{self, CString};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::os::{imp, Handle};
use crate::{last_error, Error, ErrorKind, OpenOptions, Result, Symbol};

/// An object providing access to an open shared library, or to the running process.
///
/// A `Library` owns exactly one reference to its library: it is released by [`close`](Self::close)
/// or when the value is dropped, and never twice. Symbols borrow the library, so none can outlive
/// the release.
#[derive(Debug)]
#[repr(transparent)]
pub struct Library(NonNull<ffi::c_void>);

// internal type is opaque and managed by OS, so it's `Send` safe
unsafe impl Send for Library {}
// the platform loaders lock internally, so resolving from several threads is fine
unsafe impl Sync for Library {}

impl Library {
	/// Opens the shared library at `path` with the default [`OpenOptions`].
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Load`] error if the platform could not load the library.
	///
	/// # Examples
	///
	/// ```no_run
	/// use dlbridge::Library;
	///
	/// let lib = Library::open("libexample.so").unwrap();
	/// ```
	#[inline]
	pub fn open<P: AsRef<ffi::OsStr>>(path: P) -> Result<Self> {
		OpenOptions::new().open(path)
	}

	/// Opens the running process, giving access to every symbol already linked into it.
	///
	/// # Examples
	///
	/// ```
	/// use dlbridge::Library;
	///
	/// let this = Library::this().unwrap();
	/// this.close().unwrap();
	/// ```
	pub fn this() -> Result<Self> {
		let handle = unsafe { imp::dylib_open(None, &OpenOptions::new()) };
		Self::from_handle(handle)
	}

	pub(crate) fn from_handle(handle: Handle) -> Result<Self> {
		NonNull::new(handle)
			.map(Self)
			.ok_or_else(|| Error::from_last_error(ErrorKind::Load))
	}

	/// Retrieves the address of the exported symbol `name`.
	///
	/// Resolution is idempotent and leaves the library untouched.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Resolve`] error if the symbol does not exist, or if `name` contains
	/// a NUL byte.
	pub fn symbol(&self, name: &str) -> Result<Symbol<'_>> {
		let Ok(c_name) = CString::new(name) else {
			last_error::set_str("symbol name contains a NUL byte");
			return Err(Error::from_last_error(ErrorKind::Resolve));
		};
		let addr = unsafe { imp::dylib_symbol(self.0.as_ptr(), &c_name) };
		NonNull::new(addr)
			.map(Symbol::new)
			.ok_or_else(|| Error::from_last_error(ErrorKind::Resolve))
	}

	/// Releases the library.
	///
	/// Closing the running process is accepted and does nothing.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Release`] error if the platform refused to release the library.
	/// The reference is considered gone either way.
	pub fn close(self) -> Result<()> {
		let this = ManuallyDrop::new(self);
		if unsafe { imp::dylib_close(this.0.as_ptr()) } == 0 {
			Ok(())
		} else {
			Err(Error::from_last_error(ErrorKind::Release))
		}
	}

	/// Returns the raw platform handle without giving up ownership.
	#[inline]
	pub fn as_raw(&self) -> *mut ffi::c_void {
		self.0.as_ptr()
	}

	/// Gives up ownership of the raw platform handle. The caller becomes responsible for releasing
	/// it, for example through [`dlbridge_close`](crate::ffi::dlbridge_close).
	#[inline]
	pub fn into_raw(self) -> *mut ffi::c_void {
		ManuallyDrop::new(self).0.as_ptr()
	}

	/// Takes ownership of a raw handle returned by [`into_raw`](Self::into_raw) or
	/// [`dlbridge_open`](crate::ffi::dlbridge_open). Returns `None` for a null handle.
	///
	/// # Safety
	///
	/// `handle` must be an open handle that nothing else will release.
	#[inline]
	pub unsafe fn from_raw(handle: *mut ffi::c_void) -> Option<Self> {
		NonNull::new(handle).map(Self)
	}
}

impl Drop for Library {
	// A scope exit must not wipe a diagnostic the caller has yet to read.
	fn drop(&mut self) {
		let handle = self.0.as_ptr();
		last_error::preserve(|| unsafe {
			if imp::dylib_close(handle) != 0 {
				tracing::warn!(?handle, error = ?last_error::last_error(), "failed to release library on drop");
			}
		});
	}
}
