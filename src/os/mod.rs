// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! Platform loaders.
//!
//! Both modules expose the same crate-internal function set (`dylib_open`, `dylib_symbol`,
//! `dylib_close`), and exactly one of them is compiled for a given target. Each function clears the
//! calling thread's error slot on entry and fills it only on failure.
#[cfg_attr(docsrs, doc(cfg(unix)))]
#[cfg(unix)]
pub mod unix;
#[cfg_attr(docsrs, doc(cfg(windows)))]
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub(crate) use unix as imp;
#[cfg(windows)]
pub(crate) use windows as imp;

/// Raw, untyped library handle. Null stands for the process-wide scope.
pub(crate) type Handle = *mut std::ffi::c_void;
