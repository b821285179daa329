// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::fmt;

use crate::last_error;

/// The failure classes reported by the loader and the call bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// The library could not be opened.
	Load,
	/// The symbol is not present in the searched scope.
	Resolve,
	/// The platform refused to release the library.
	Release,
	/// A type, layout, ABI or signature description is malformed.
	Descriptor,
	/// A call argument or callback result does not fit its descriptor.
	Argument,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ErrorKind::Load => "failed to load library",
			ErrorKind::Resolve => "failed to resolve symbol",
			ErrorKind::Release => "failed to release library",
			ErrorKind::Descriptor => "invalid call descriptor",
			ErrorKind::Argument => "invalid argument",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
	kind: ErrorKind,
	message: String,
}

impl Error {
	#[inline]
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	/// Captures the calling thread's loader error slot.
	pub(crate) fn from_last_error(kind: ErrorKind) -> Self {
		let message = last_error::last_error().unwrap_or_else(|| match kind {
			ErrorKind::Load => "unknown dlopen error".to_owned(),
			ErrorKind::Resolve => "symbol lookup failed".to_owned(),
			ErrorKind::Release => "dlclose failed".to_owned(),
			other => other.to_string(),
		});
		Self::new(kind, message)
	}

	#[inline]
	pub const fn kind(&self) -> ErrorKind {
		self.kind
	}

	/// The diagnostic text, without the kind prefix.
	#[inline]
	pub fn message(&self) -> &str {
		&self.message
	}
}
