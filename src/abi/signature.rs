// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::fmt;
use std::str::FromStr;

use libffi::middle::{Cif, FfiAbi};

use super::{CType, TypeCode};
use crate::{Error, ErrorKind, Result};

/// A calling convention.
///
/// Only [`Abi::Default`] exists everywhere; the others are accepted on the targets that have them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Abi {
	/// The platform's C convention. Also spelled `cdecl`.
	#[default]
	Default,
	SysV,
	/// 32-bit x86 only.
	Stdcall,
	/// Also spelled `ms_abi`.
	MsCdecl,
	Win64,
}

impl Abi {
	pub const fn name(self) -> &'static str {
		match self {
			Abi::Default => "default",
			Abi::SysV => "sysv",
			Abi::Stdcall => "stdcall",
			Abi::MsCdecl => "ms_cdecl",
			Abi::Win64 => "win64",
		}
	}

	/// Whether the convention can be used on the build target.
	#[inline]
	pub fn is_supported(self) -> bool {
		self.resolve().is_ok()
	}

	// `None` leaves libffi on its default convention.
	fn resolve(self) -> Result<Option<FfiAbi>> {
		let abi = match self {
			Abi::Default => return Ok(None),
			Abi::SysV => sysv(),
			Abi::Stdcall => stdcall(),
			Abi::MsCdecl => ms_cdecl(),
			Abi::Win64 => win64(),
		};
		match abi {
			Some(abi) => Ok(Some(abi)),
			None => Err(Error::new(
				ErrorKind::Descriptor,
				format!("ABI '{self}' is not available on this target"),
			)),
		}
	}
}

#[cfg(all(target_arch = "x86_64", unix))]
fn sysv() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_UNIX64)
}
#[cfg(all(target_arch = "x86_64", windows))]
fn sysv() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_WIN64)
}
#[cfg(any(target_arch = "x86", target_arch = "arm", target_arch = "aarch64"))]
fn sysv() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_SYSV)
}
#[cfg(not(any(
	all(target_arch = "x86_64", any(unix, windows)),
	target_arch = "x86",
	target_arch = "arm",
	target_arch = "aarch64"
)))]
fn sysv() -> Option<FfiAbi> {
	None
}

#[cfg(target_arch = "x86")]
fn stdcall() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_STDCALL)
}
#[cfg(not(target_arch = "x86"))]
fn stdcall() -> Option<FfiAbi> {
	None
}

#[cfg(all(windows, target_arch = "x86"))]
fn ms_cdecl() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_MS_CDECL)
}
#[cfg(all(windows, target_arch = "x86_64"))]
fn ms_cdecl() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_WIN64)
}
#[cfg(not(all(windows, any(target_arch = "x86", target_arch = "x86_64"))))]
fn ms_cdecl() -> Option<FfiAbi> {
	None
}

#[cfg(all(windows, target_arch = "x86_64"))]
fn win64() -> Option<FfiAbi> {
	Some(libffi::raw::ffi_abi_FFI_WIN64)
}
#[cfg(not(all(windows, target_arch = "x86_64")))]
fn win64() -> Option<FfiAbi> {
	None
}

impl fmt::Display for Abi {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Abi {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"default" | "cdecl" => Ok(Abi::Default),
			"sysv" => Ok(Abi::SysV),
			"stdcall" => Ok(Abi::Stdcall),
			"ms_abi" | "ms_cdecl" => Ok(Abi::MsCdecl),
			"win64" => Ok(Abi::Win64),
			other => Err(Error::new(
				ErrorKind::Descriptor,
				format!("unsupported ABI '{other}'"),
			)),
		}
	}
}

/// The full description of a native function: calling convention, result, and arguments.
///
/// A variadic signature lists the types of one particular call, the first `fixed_count` of which
/// are the declared parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
	abi: Abi,
	result: CType,
	args: Vec<CType>,
	variadic: bool,
	fixed_count: usize,
}

impl Signature {
	/// A signature with a fixed parameter list.
	pub fn new(result: CType, args: Vec<CType>) -> Result<Self> {
		let fixed_count = args.len();
		Self::build(result, args, false, fixed_count)
	}

	/// A signature for one call of a variadic function with `fixed_count` declared parameters.
	///
	/// Trailing arguments must already be of their promoted types: `double` rather than `float`,
	/// and `int` or wider rather than `char` or `short`.
	pub fn variadic(result: CType, args: Vec<CType>, fixed_count: usize) -> Result<Self> {
		Self::build(result, args, true, fixed_count)
	}

	fn build(result: CType, args: Vec<CType>, variadic: bool, fixed_count: usize) -> Result<Self> {
		let sig = Self {
			abi: Abi::Default,
			result,
			args,
			variadic,
			fixed_count,
		};
		sig.validate()?;
		Ok(sig)
	}

	/// Switches the calling convention.
	///
	/// # Errors
	///
	/// Returns an [`ErrorKind::Descriptor`] error if the build target lacks `abi`.
	pub fn with_abi(mut self, abi: Abi) -> Result<Self> {
		abi.resolve()?;
		self.abi = abi;
		Ok(self)
	}

	// libffi panics on descriptors it rejects, so everything it would reject is caught here.
	fn validate(&self) -> Result<()> {
		let invalid = |message: String| Err(Error::new(ErrorKind::Descriptor, message));

		if self.fixed_count > self.args.len() {
			return invalid(format!(
				"fixed argument count ({}) exceeds the number of arguments ({})",
				self.fixed_count,
				self.args.len()
			));
		}
		if !self.variadic && self.fixed_count != self.args.len() {
			return invalid("fixed argument count must equal the number of arguments".into());
		}
		if let Some(index) = self.args.iter().position(CType::is_void) {
			return invalid(format!("argument {index} cannot be void"));
		}
		for (index, ty) in self.args.iter().enumerate().skip(self.fixed_count) {
			if let Some(code) = ty.code() {
				let promotable = matches!(
					code,
					TypeCode::Float32 | TypeCode::Int8 | TypeCode::UInt8 | TypeCode::Int16 | TypeCode::UInt16
				);
				if promotable {
					return invalid(format!(
						"variadic argument {index} of type {code} must be passed as its promoted type"
					));
				}
			}
		}
		Ok(())
	}

	#[inline]
	pub fn abi(&self) -> Abi {
		self.abi
	}

	#[inline]
	pub fn result(&self) -> &CType {
		&self.result
	}

	#[inline]
	pub fn args(&self) -> &[CType] {
		&self.args
	}

	#[inline]
	pub fn is_variadic(&self) -> bool {
		self.variadic
	}

	#[inline]
	pub fn fixed_count(&self) -> usize {
		self.fixed_count
	}

	pub(crate) fn build_cif(&self) -> Result<Cif> {
		let args = self.args.iter().map(CType::ffi_type);
		let result = self.result.ffi_type();
		let mut cif = if self.variadic {
			Cif::new_variadic(args, self.fixed_count, result)
		} else {
			Cif::new(args, result)
		};
		if let Some(abi) = self.abi.resolve()? {
			cif.set_abi(abi);
		}
		Ok(cif)
	}
}
