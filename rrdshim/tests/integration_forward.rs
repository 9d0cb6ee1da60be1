//! Integration tests for the forwarding protocol.
//!
//! These tests verify that each forwarded call reports exactly the error the
//! library raised during that call, that errors on different threads never
//! mix, and that failing to copy an error message terminates the process.

use std::ffi::{CString, c_char};
use std::process::Command;
use std::ptr;

use rrdshim::capture::capture_error;
use rrdshim::forward;
use rrdshim::mock::{MockLibrary, Operation};

/// Env var marking the re-executed child of the abort test.
const ABORT_CHILD_ENV: &str = "RRDSHIM_ABORT_CHILD";

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

/// Runs one forwarded update and returns its error message, if any.
fn update_once(lib: &MockLibrary) -> Option<String> {
    let file = c("load.rrd");
    let row = c("N:1");
    let argv = [row.as_ptr()];
    // SAFETY: every pointer references a live CString.
    let err = unsafe { forward::update(lib, file.as_ptr(), ptr::null(), 1, argv.as_ptr()) };
    err.map(|e| e.to_string())
}

#[test]
fn test_error_matches_current_call() {
    let lib = MockLibrary::new();
    assert_eq!(update_once(&lib), None);

    lib.fail(Operation::Update, "first failure");
    assert_eq!(update_once(&lib).as_deref(), Some("first failure"));

    lib.fail(Operation::Update, "second failure");
    assert_eq!(update_once(&lib).as_deref(), Some("second failure"));

    // The earlier failure leaves the slot set; a succeeding call must not
    // report it.
    lib.succeed(Operation::Update);
    assert_eq!(update_once(&lib), None);
}

#[test]
fn test_threads_do_not_share_errors() {
    const ROUNDS: usize = 500;

    std::thread::scope(|s| {
        for name in ["alpha", "beta"] {
            s.spawn(move || {
                let lib = MockLibrary::new();
                let message = format!("{name}: illegal attempt to update");
                lib.fail(Operation::Update, &message);
                for _ in 0..ROUNDS {
                    assert_eq!(update_once(&lib).as_deref(), Some(message.as_str()));
                }
            });
        }

        s.spawn(|| {
            let lib = MockLibrary::new();
            for _ in 0..ROUNDS {
                assert_eq!(update_once(&lib), None);
            }
        });
    });
}

#[test]
fn test_one_library_shared_across_threads() {
    let lib = MockLibrary::new();
    lib.fail(Operation::Create, "creating 'x.rrd': Permission denied");

    std::thread::scope(|s| {
        let lib = &lib;
        for _ in 0..4 {
            s.spawn(move || {
                let file = c("x.rrd");
                let argv: [*const c_char; 0] = [];
                // SAFETY: file is a live CString; argc is 0.
                let err = unsafe { forward::create(lib, file.as_ptr(), 300, 0, 0, argv.as_ptr()) };
                assert_eq!(
                    err.unwrap().to_string(),
                    "creating 'x.rrd': Permission denied"
                );
            });
        }
    });
    assert_eq!(lib.calls().len(), 4);
}

#[test]
fn test_allocation_failure_aborts() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        let lib = MockLibrary::new();
        lib.fail_allocation(true);
        lib.set_error("no memory left to copy this");
        let _ = capture_error(&lib);
        // capture_error must not return.
        std::process::exit(0);
    }

    let exe = std::env::current_exe().unwrap();
    let status = Command::new(exe)
        .args(["--exact", "test_allocation_failure_aborts", "--nocapture"])
        .env(ABORT_CHILD_ENV, "1")
        .status()
        .unwrap();
    assert!(!status.success());

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(libc::SIGABRT));
    }
}
