// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::ffi;

use crate::os::imp;
use crate::{Library, Result};

/// When undefined symbols in a freshly opened library are bound.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
	/// Bind function references on first call (`RTLD_LAZY`).
	#[default]
	Lazy,
	/// Bind everything before `open` returns (`RTLD_NOW`).
	Now,
}

/// Whether an opened library's symbols join the global lookup scope.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
	/// Symbols stay private to this handle (`RTLD_LOCAL`).
	#[default]
	Local,
	/// Symbols become visible to later loads (`RTLD_GLOBAL`).
	Global,
}

/// Options and flags used to configure how a library is opened.
///
/// The defaults are lazy binding with private symbol scope on unix, and the standard search order
/// on windows.
///
/// # Examples
///
/// ```no_run
/// # #[cfg(unix)] {
/// use dlbridge::{Binding, OpenOptions};
///
/// let lib = OpenOptions::new().binding(Binding::Now).open("libm.so.6").unwrap();
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOptions {
	#[cfg(unix)]
	binding: Binding,
	#[cfg(unix)]
	scope: Scope,
	#[cfg(windows)]
	flags: u32,
}

impl OpenOptions {
	#[inline]
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(unix)]
	#[inline]
	pub fn binding(&mut self, binding: Binding) -> &mut Self {
		self.binding = binding;
		self
	}

	#[cfg(unix)]
	#[inline]
	pub fn scope(&mut self, scope: Scope) -> &mut Self {
		self.scope = scope;
		self
	}

	/// Sets the raw `LoadLibraryExW` flags, see [`os::windows`](crate::os::windows) for the
	/// named values.
	#[cfg(windows)]
	#[inline]
	pub fn flags(&mut self, flags: u32) -> &mut Self {
		self.flags = flags;
		self
	}

	/// The `dlopen` mode these options describe.
	#[cfg(unix)]
	pub(crate) fn mode(&self) -> ffi::c_int {
		let binding = match self.binding {
			Binding::Lazy => libc::RTLD_LAZY,
			Binding::Now => libc::RTLD_NOW,
		};
		let scope = match self.scope {
			Scope::Local => libc::RTLD_LOCAL,
			Scope::Global => libc::RTLD_GLOBAL,
		};
		binding | scope
	}

	#[cfg(windows)]
	pub(crate) fn load_flags(&self) -> u32 {
		self.flags
	}

	/// Opens the library at `path` with these options.
	///
	/// An empty path opens the running process, exactly like [`Library::this`].
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Load`](crate::ErrorKind::Load) error carrying the platform's
	/// diagnostic. The same text remains readable through [`last_error`](crate::last_error).
	pub fn open<P: AsRef<ffi::OsStr>>(&self, path: P) -> Result<Library> {
		let path = path.as_ref();
		let handle = unsafe { imp::dylib_open(Some(path), self) };
		Library::from_handle(handle)
	}
}
