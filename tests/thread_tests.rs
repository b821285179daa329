use dlbridge::*;

#[test]
fn test_errors_are_per_thread() {
	std::thread::scope(|s| {
		let failing = s.spawn(|| {
			assert!(Library::open("dlbridge_missing_on_thread_a").is_err());
			last_error()
		});
		let succeeding = s.spawn(|| {
			let this = Library::this().unwrap();
			this.close().unwrap();
			last_error()
		});
		assert!(failing.join().unwrap().is_some());
		assert!(succeeding.join().unwrap().is_none());
	});
}

#[test]
fn test_failure_does_not_leak_to_main_thread() {
	Library::this().unwrap().close().unwrap();
	assert!(last_error().is_none());
	std::thread::spawn(|| {
		assert!(Library::open("dlbridge_missing_on_worker").is_err());
		assert!(last_error().is_some());
	})
	.join()
	.unwrap();
	assert!(last_error().is_none());
}

#[test]
fn test_shared_library_across_threads() {
	let this = Library::this().unwrap();
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				let err = this.symbol("dlbridge_no_such_symbol_0451").unwrap_err();
				assert_eq!(err.kind(), ErrorKind::Resolve);
				assert!(last_error().is_some());
			});
		}
	});
	this.close().unwrap();
}
