// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
//! Run-time call descriptors.
//!
//! A resolved address says nothing about the function behind it, so the caller describes it:
//! [`CType`] and [`Layout`] give the native types (including by-value structs and unions),
//! [`Signature`] the whole call, and [`Value`] the arguments. [`Signature::call`] then invokes the
//! address through libffi, and [`Callback`] turns a Rust closure into a native function pointer.
//!
//! ```
//! use dlbridge::abi::{CType, Signature, TypeCode, Value};
//! use dlbridge::probe;
//!
//! let int = CType::from(TypeCode::Int32);
//! let sig = Signature::new(int.clone(), vec![int.clone(), int]).unwrap();
//! let sum = unsafe {
//! 	sig.call(probe::probe_add_ints as *const _, &[Value::I32(2), Value::I32(3)])
//! }
//! .unwrap();
//! assert_eq!(sum, Value::I32(5));
//! ```

mod call;
mod callback;
mod layout;
mod signature;
mod types;
mod value;

pub use callback::Callback;
pub use layout::{Layout, LayoutKind};
pub use signature::{Abi, Signature};
pub use types::{CType, TypeCode};
pub use value::Value;
