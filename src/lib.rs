// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! Run-time shared library loading with a native call bridge.
//!
//! The loader opens shared libraries (or the running process), resolves symbols, and releases
//! them again. Every loader operation records its outcome in a per-thread error slot, read with
//! [`last_error`]. Call descriptors in [`abi`] describe native signatures at run time so resolved
//! symbols can be invoked, and Rust closures can be handed to native code as callbacks.
//!
//! ```no_run
//! use dlbridge::Library;
//! use std::ffi::c_int;
//!
//! let lib = Library::open("libexample.so").unwrap();
//! let sym = lib.symbol("example_add_ints").unwrap();
//! let add: extern "C" fn(c_int, c_int) -> c_int = unsafe { sym.as_fn() };
//! assert_eq!(add(2, 3), 5);
//! lib.close().unwrap();
//! assert!(dlbridge::last_error().is_none());
//! ```
#![allow(clippy::missing_safety_doc)]

pub mod abi;
pub mod error;
pub mod ffi;
pub mod last_error;
mod library;
mod options;
pub mod os;
pub mod probe;
mod sym;

pub use error::{Error, ErrorKind};
pub use last_error::{last_error, with_last_error};
pub use library::Library;
pub use options::OpenOptions;
#[cfg(unix)]
pub use options::{Binding, Scope};
pub use sym::Symbol;

/// The result of a dlbridge function
pub type Result<T> = std::result::Result<T, error::Error>;
