use std::cell::Cell;
use std::ffi::{c_void, CStr, CString};
use std::rc::Rc;

use dlbridge::abi::{Abi, CType, Callback, Signature, TypeCode, Value};
use dlbridge::probe::{self, ProbePair, ProbeRef, ProbeWord};
use dlbridge::ErrorKind;

fn int() -> CType {
	CType::from(TypeCode::Int32)
}

fn pointer() -> CType {
	CType::from(TypeCode::Pointer)
}

#[test]
fn test_add_ints() {
	let sig = Signature::new(int(), vec![int(), int()]).unwrap();
	let out = unsafe { sig.call(probe::probe_add_ints as *const c_void, &[Value::I32(40), Value::I64(2)]) }.unwrap();
	assert_eq!(out, Value::I32(42));
}

#[test]
fn test_explicit_default_abi() {
	let sig = Signature::new(int(), vec![int(), int()])
		.unwrap()
		.with_abi("cdecl".parse::<Abi>().unwrap())
		.unwrap();
	let out = unsafe { sig.call(probe::probe_add_ints as *const c_void, &[Value::I32(-1), Value::I32(1)]) }.unwrap();
	assert_eq!(out, Value::I32(0));
}

#[test]
fn test_variadic_sum() {
	let sum = probe::probe_variadic_sum as *const c_void;
	for count in 0..5usize {
		let sig = Signature::variadic(int(), vec![int(); count + 1], 1).unwrap();
		let mut args = vec![Value::I32(count as i32)];
		args.extend((1..=count).map(|v| Value::I32(v as i32 * 10)));
		let out = unsafe { sig.call(sum, &args) }.unwrap();
		assert_eq!(out, Value::I32((count * (count + 1) / 2 * 10) as i32));
	}
}

fn format_signature() -> Signature {
	Signature::variadic(
		int(),
		vec![pointer(), TypeCode::UIntPtr.into(), pointer(), int(), pointer()],
		3,
	)
	.unwrap()
}

#[test]
fn test_variadic_format_truncates() {
	let fmt = CString::new("%d-%s").unwrap();
	let word = CString::new("abcdef").unwrap();
	let mut buf = [0u8; 8];
	let out = unsafe {
		format_signature().call(
			probe::probe_variadic_format as *const c_void,
			&[
				Value::Pointer(buf.as_mut_ptr().cast()),
				Value::UIntPtr(buf.len()),
				Value::from(fmt.as_ptr().cast::<c_void>()),
				Value::I32(12345),
				Value::from(word.as_ptr().cast::<c_void>()),
			],
		)
	}
	.unwrap();
	assert_eq!(out, Value::I32(12));
	assert_eq!(CStr::from_bytes_until_nul(&buf).unwrap().to_str().unwrap(), "12345-a");
}

#[test]
fn test_variadic_format_rejects_empty_buffer() {
	let fmt = CString::new("%d-%s").unwrap();
	let word = CString::new("x").unwrap();
	let out = unsafe {
		format_signature().call(
			probe::probe_variadic_format as *const c_void,
			&[
				Value::null(),
				Value::UIntPtr(0),
				Value::from(fmt.as_ptr().cast::<c_void>()),
				Value::I32(1),
				Value::from(word.as_ptr().cast::<c_void>()),
			],
		)
	}
	.unwrap();
	assert_eq!(out, Value::I32(-1));
}

#[test]
fn test_callback_roundtrip() {
	let calls = Rc::new(Cell::new(0));
	let seen = calls.clone();
	let callback = Callback::new(Signature::new(int(), vec![int()]).unwrap(), move |args| {
		seen.set(seen.get() + 1);
		Value::I64(args[0].as_integer().unwrap_or(0) as i64 * 3)
	})
	.unwrap();

	let sig = Signature::new(int(), vec![pointer(), int()]).unwrap();
	let call = probe::probe_call_callback as *const c_void;
	let out = unsafe { sig.call(call, &[Value::from(callback.code_ptr()), Value::I32(14)]) }.unwrap();
	assert_eq!(out, Value::I32(42));
	assert_eq!(calls.get(), 1);

	let out = unsafe { sig.call(call, &[Value::null(), Value::I32(14)]) }.unwrap();
	assert_eq!(out, Value::I32(-1));
	assert_eq!(calls.get(), 1);
}

#[test]
fn test_pair_by_value() {
	let pair = ProbePair::ctype().unwrap();
	let layout = pair.layout().unwrap();
	let mut bytes = layout.zeroed();
	layout.write(&mut bytes, 0, Value::I32(7)).unwrap();
	layout.write(&mut bytes, 1, Value::F64(0.25)).unwrap();
	let arg = [Value::Aggregate(bytes)];

	let id = Signature::new(int(), vec![pair.clone()]).unwrap();
	let weight = Signature::new(TypeCode::Float64.into(), vec![pair.clone()]).unwrap();
	let total = Signature::new(TypeCode::Float64.into(), vec![pair]).unwrap();
	unsafe {
		assert_eq!(id.call(probe::probe_pair_id as *const c_void, &arg).unwrap(), Value::I32(7));
		assert_eq!(weight.call(probe::probe_pair_weight as *const c_void, &arg).unwrap(), Value::F64(0.25));
		assert_eq!(total.call(probe::probe_pair_total as *const c_void, &arg).unwrap(), Value::F64(7.25));
	}
}

#[test]
fn test_pair_size_mismatch() {
	let pair = ProbePair::ctype().unwrap();
	let sig = Signature::new(int(), vec![pair]).unwrap();
	let err = unsafe { sig.call(probe::probe_pair_id as *const c_void, &[Value::Aggregate(vec![0; 4])]) }.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn test_ref_through_pointer() {
	let value = 99i32;
	let sig = Signature::new(int(), vec![pointer()]).unwrap();
	let read = probe::probe_ref_read as *const c_void;

	let set = ProbeRef { flag: 1, value: &value };
	let clear = ProbeRef { flag: 0, value: &value };
	let dangling = ProbeRef { flag: 1, value: std::ptr::null() };
	unsafe {
		let call = |r: &ProbeRef| sig.call(read, &[Value::from((r as *const ProbeRef).cast::<c_void>())]).unwrap();
		assert_eq!(call(&set), Value::I32(99));
		assert_eq!(call(&clear), Value::I32(0));
		assert_eq!(call(&dangling), Value::I32(-1));
		assert_eq!(sig.call(read, &[Value::null()]).unwrap(), Value::I32(-1));
	}
}

#[test]
fn test_ref_layout_matches() {
	let value = 5i32;
	let r = ProbeRef { flag: 1, value: &value };
	let ty = ProbeRef::ctype().unwrap();
	let layout = ty.layout().unwrap();
	let bytes = unsafe { std::slice::from_raw_parts((&r as *const ProbeRef).cast::<u8>(), layout.size()) };
	assert_eq!(layout.read(bytes, 0).unwrap(), Value::I32(1));
	assert_eq!(layout.read(bytes, 1).unwrap(), Value::Pointer((&value as *const i32).cast_mut().cast()));
}

#[test]
fn test_word_by_value() {
	let word = ProbeWord::ctype().unwrap();
	let layout = word.layout().unwrap();
	let marker = 0x1234usize as *mut c_void;

	let mut bytes = layout.zeroed();
	layout.write(&mut bytes, 1, Value::Pointer(marker)).unwrap();
	let is = Signature::new(int(), vec![word.clone(), pointer()]).unwrap();
	let out = unsafe {
		is.call(probe::probe_word_is as *const c_void, &[Value::Aggregate(bytes.clone()), Value::Pointer(marker)])
	}
	.unwrap();
	assert_eq!(out, Value::I32(1));

	let mut bytes = layout.zeroed();
	layout.write(&mut bytes, 0, Value::I64(-77)).unwrap();
	let bits = Signature::new(TypeCode::Int64.into(), vec![word]).unwrap();
	let out = unsafe { bits.call(probe::probe_word_bits as *const c_void, &[Value::Aggregate(bytes)]) }.unwrap();
	assert_eq!(out, Value::I64(-77));
	assert_eq!(unsafe { probe::probe_word_bits(ProbeWord { bits: -77 }) }, -77);
}

#[test]
fn test_greeting() {
	let sig = Signature::new(pointer(), vec![]).unwrap();
	let out = unsafe { sig.call(probe::probe_greeting as *const c_void, &[]) }.unwrap();
	let ptr = out.as_ptr().unwrap();
	let text = unsafe { CStr::from_ptr(ptr.cast()) };
	assert_eq!(text.to_str().unwrap(), "Hello from the probe bridge");
}

#[repr(C)]
#[derive(Clone, Copy)]
union IntOrFloat {
	i: i32,
	f: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
union LongOrDouble {
	l: i64,
	d: f64,
}

#[repr(C)]
#[derive(Clone, Copy)]
union FloatOrDouble {
	f: f32,
	d: f64,
}

extern "C" fn read_int(value: IntOrFloat) -> i32 {
	unsafe { value.i }
}

extern "C" fn read_long(value: LongOrDouble) -> i64 {
	unsafe { value.l }
}

extern "C" fn read_double(value: FloatOrDouble) -> f64 {
	unsafe { value.d }
}

extern "C" fn make_long(bits: i64) -> LongOrDouble {
	LongOrDouble { l: bits }
}

fn union_arg(ty: &CType, index: usize, value: Value) -> Value {
	let layout = ty.layout().unwrap();
	let mut bytes = layout.zeroed();
	layout.write(&mut bytes, index, value).unwrap();
	Value::Aggregate(bytes)
}

#[test]
fn test_mixed_int_float_union_by_value() {
	let ty = CType::union([TypeCode::Int32.into(), TypeCode::Float32.into()]).unwrap();
	let sig = Signature::new(int(), vec![ty.clone()]).unwrap();
	let out = unsafe { sig.call(read_int as *const c_void, &[union_arg(&ty, 0, Value::I32(4242))]) }.unwrap();
	assert_eq!(out, Value::I32(4242));

	let ty = CType::union([TypeCode::Int64.into(), TypeCode::Float64.into()]).unwrap();
	let sig = Signature::new(TypeCode::Int64.into(), vec![ty.clone()]).unwrap();
	let out = unsafe { sig.call(read_long as *const c_void, &[union_arg(&ty, 0, Value::I64(-99))]) }.unwrap();
	assert_eq!(out, Value::I64(-99));
}

#[test]
fn test_float_only_union_by_value() {
	let ty = CType::union([TypeCode::Float32.into(), TypeCode::Float64.into()]).unwrap();
	let sig = Signature::new(TypeCode::Float64.into(), vec![ty.clone()]).unwrap();
	let out = unsafe { sig.call(read_double as *const c_void, &[union_arg(&ty, 1, Value::F64(6.5))]) }.unwrap();
	assert_eq!(out, Value::F64(6.5));
}

#[test]
fn test_mixed_union_result() {
	let ty = CType::union([TypeCode::Int64.into(), TypeCode::Float64.into()]).unwrap();
	let sig = Signature::new(ty.clone(), vec![TypeCode::Int64.into()]).unwrap();
	let out = unsafe { sig.call(make_long as *const c_void, &[Value::I64(-7)]) }.unwrap();
	let bytes = out.as_bytes().unwrap();
	assert_eq!(ty.layout().unwrap().read(bytes, 0).unwrap(), Value::I64(-7));
}
