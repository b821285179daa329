// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::env;
use std::fs;
use std::path::PathBuf;

// The probe fixtures are plain C so the variadic shapes are defined by a real C compiler.
fn main() {
	println!("cargo:rerun-if-changed=native/probe.c");

	cc::Build::new()
		.file("native/probe.c")
		.flag_if_supported("-fno-common")
		.compile("dlbridge_probe");

	let shared = build_shared_fixtures();
	println!("cargo:rustc-env=DLBRIDGE_PROBE_LIBRARY={}", shared.display());
}

// The same fixtures as a standalone shared library, so the loader can open them by path.
fn build_shared_fixtures() -> PathBuf {
	let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR")).join("shared");
	fs::create_dir_all(&out_dir).expect("failed to create the shared fixture directory");

	let mut build = cc::Build::new();
	build.file("native/probe.c").pic(true).out_dir(&out_dir);
	let objects = build.compile_intermediates();
	let compiler = build.get_compiler();

	let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
	let name = match target_os.as_str() {
		"windows" => "dlbridge_probe.dll",
		"macos" | "ios" => "libdlbridge_probe.dylib",
		_ => "libdlbridge_probe.so",
	};
	let lib_path = out_dir.join(name);

	let mut cmd = compiler.to_command();
	cmd.current_dir(&out_dir);
	if compiler.is_like_msvc() {
		cmd.args(&objects);
		cmd.arg("/LD");
		cmd.arg(format!("/Fe{}", lib_path.display()));
	} else {
		cmd.arg(if target_os == "macos" { "-dynamiclib" } else { "-shared" });
		cmd.arg("-o");
		cmd.arg(&lib_path);
		cmd.args(&objects);
	}

	let status = cmd
		.status()
		.unwrap_or_else(|err| panic!("failed to run the linker ({cmd:?}): {err}"));
	assert!(status.success(), "linking {} failed with {status}", lib_path.display());
	lib_path
}
