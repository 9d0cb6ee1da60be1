//! Forwarders: one per librrd entry point, all with the same protocol.
//!
//! 1. Clear this thread's error state.
//! 2. Call the library, passing every argument through unchanged.
//! 3. Capture any resulting error with [`capture_error`].
//!
//! Nothing is validated, retried or transformed here. The three steps run
//! synchronously on the calling thread, which is what keeps librrd's
//! thread-local error slot attributable to this call.
//!
//! Results the C shim writes through `ret` come back as the first element of
//! a tuple; in/out parameters of fetch and export stay raw pointers.

use std::ffi::{c_char, c_int, c_ulong};

use crate::capture::{ErrorMessage, capture_error};
use crate::library::RrdLibrary;
use crate::sys::{rrd_info_t, rrd_value_t, time_t};

/// Creates a database. See `rrd_create_r`.
///
/// # Safety
///
/// `filename` must be a valid C string and `argv` must point to `argc` valid
/// C strings.
pub unsafe fn create<L: RrdLibrary + ?Sized>(
    lib: &L,
    filename: *const c_char,
    step: c_ulong,
    start: time_t,
    argc: c_int,
    argv: *const *const c_char,
) -> Option<ErrorMessage> {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    unsafe { lib.create(filename, step, start, argc, argv) };
    capture_error(lib)
}

/// Feeds update strings into a database. See `rrd_update_r`.
///
/// # Safety
///
/// `filename` must be a valid C string, `template` a valid C string or null,
/// and `argv` must point to `argc` valid C strings.
pub unsafe fn update<L: RrdLibrary + ?Sized>(
    lib: &L,
    filename: *const c_char,
    template: *const c_char,
    argc: c_int,
    argv: *const *const c_char,
) -> Option<ErrorMessage> {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    unsafe { lib.update(filename, template, argc, argv) };
    capture_error(lib)
}

/// Renders a graph and returns its info list. See `rrd_graph_v`.
///
/// # Safety
///
/// `argv` must point to `argc` valid C strings; the table may be permuted.
pub unsafe fn graph<L: RrdLibrary + ?Sized>(
    lib: &L,
    argc: c_int,
    argv: *mut *mut c_char,
) -> (*mut rrd_info_t, Option<ErrorMessage>) {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    let info = unsafe { lib.graph(argc, argv) };
    (info, capture_error(lib))
}

/// Reads a database header. See `rrd_info_r`.
///
/// # Safety
///
/// `filename` must be a valid C string.
pub unsafe fn info<L: RrdLibrary + ?Sized>(
    lib: &L,
    filename: *mut c_char,
) -> (*mut rrd_info_t, Option<ErrorMessage>) {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    let info = unsafe { lib.info(filename) };
    (info, capture_error(lib))
}

/// Fetches consolidated rows. See `rrd_fetch_r`.
///
/// # Safety
///
/// `filename` and `cf` must be valid C strings; every other pointer must be
/// valid for reads and writes.
#[allow(clippy::too_many_arguments)]
pub unsafe fn fetch<L: RrdLibrary + ?Sized>(
    lib: &L,
    filename: *const c_char,
    cf: *const c_char,
    start: *mut time_t,
    end: *mut time_t,
    step: *mut c_ulong,
    ds_cnt: *mut c_ulong,
    ds_namv: *mut *mut *mut c_char,
    data: *mut *mut rrd_value_t,
) -> (c_int, Option<ErrorMessage>) {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    let status = unsafe { lib.fetch(filename, cf, start, end, step, ds_cnt, ds_namv, data) };
    (status, capture_error(lib))
}

/// Exports computed series. See `rrd_xport`.
///
/// # Safety
///
/// `argv` must point to `argc` valid C strings; every other pointer must be
/// valid for writes.
#[allow(clippy::too_many_arguments)]
pub unsafe fn xport<L: RrdLibrary + ?Sized>(
    lib: &L,
    argc: c_int,
    argv: *mut *mut c_char,
    xsize: *mut c_int,
    start: *mut time_t,
    end: *mut time_t,
    step: *mut c_ulong,
    col_cnt: *mut c_ulong,
    legend_v: *mut *mut *mut c_char,
    data: *mut *mut rrd_value_t,
) -> (c_int, Option<ErrorMessage>) {
    lib.clear_error();
    // SAFETY: pointer contract upheld by the caller.
    let status = unsafe {
        lib.xport(
            argc, argv, xsize, start, end, step, col_cnt, legend_v, data,
        )
    };
    (status, capture_error(lib))
}

/// Returns `values[i]`.
///
/// # Safety
///
/// `values` must point to an array with more than `i` elements. There is
/// no bounds check.
pub unsafe fn array_get(values: *const *mut c_char, i: c_int) -> *mut c_char {
    // SAFETY: the caller guarantees `i` is in bounds.
    unsafe { *values.offset(i as isize) }
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::ptr;

    use super::*;
    use crate::mock::{MockLibrary, Operation};

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_success_returns_none() {
        let lib = MockLibrary::new();
        let file = c("load.rrd");
        let args = [c("DS:load:GAUGE:600:0:U"), c("RRA:AVERAGE:0.5:1:288")];
        let argv: Vec<_> = args.iter().map(|a| a.as_ptr()).collect();

        // SAFETY: every pointer references a live CString.
        let err = unsafe { create(&lib, file.as_ptr(), 300, 1_700_000_000, 2, argv.as_ptr()) };
        assert!(err.is_none());

        let calls = lib.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, Operation::Create);
        assert_eq!(
            calls[0].args,
            [
                "load.rrd",
                "300",
                "1700000000",
                "DS:load:GAUGE:600:0:U",
                "RRA:AVERAGE:0.5:1:288"
            ]
        );
    }

    #[test]
    fn test_failure_returns_message() {
        let lib = MockLibrary::new();
        lib.fail(Operation::Update, "illegal attempt to update using time 10");
        let file = c("load.rrd");
        let value = c("10:1");
        let argv = [value.as_ptr()];

        // SAFETY: every pointer references a live CString.
        let err = unsafe { update(&lib, file.as_ptr(), ptr::null(), 1, argv.as_ptr()) }.unwrap();
        assert_eq!(err.to_string(), "illegal attempt to update using time 10");
    }

    #[test]
    fn test_stale_error_is_cleared() {
        let lib = MockLibrary::new();
        lib.set_error("left over from an unrelated call");
        let file = c("load.rrd");

        // SAFETY: file is a live CString.
        let (ret, err) = unsafe { info(&lib, file.as_ptr().cast_mut()) };
        assert!(err.is_none());
        assert!(!ret.is_null());
        // SAFETY: ret came from this library's info.
        unsafe { lib.info_free(ret) };
    }

    #[test]
    fn test_fetch_status_and_outputs() {
        let lib = MockLibrary::new();
        lib.set_fetch_output(100, 400, 100, &["in", "out"], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let file = c("net.rrd");
        let cf = c("AVERAGE");
        let (mut start, mut end, mut step, mut ds_cnt) = (0, 400, 1, 0);
        let mut names: *mut *mut c_char = ptr::null_mut();
        let mut data: *mut f64 = ptr::null_mut();

        // SAFETY: all out-pointers reference locals.
        let (status, err) = unsafe {
            fetch(
                &lib,
                file.as_ptr(),
                cf.as_ptr(),
                &mut start,
                &mut end,
                &mut step,
                &mut ds_cnt,
                &mut names,
                &mut data,
            )
        };
        assert_eq!(status, 0);
        assert!(err.is_none());
        assert_eq!((start, end, step, ds_cnt), (100, 400, 100, 2));

        // SAFETY: the mock allocated two names.
        let second = unsafe { CStr::from_ptr(array_get(names, 1)) };
        assert_eq!(second.to_str().unwrap(), "out");

        // SAFETY: releasing what the mock allocated, once each.
        unsafe {
            lib.free_mem(array_get(names, 0).cast());
            lib.free_mem(array_get(names, 1).cast());
            lib.free_mem(names.cast());
            lib.free_mem(data.cast());
        }
        assert_eq!(lib.outstanding_allocations(), 0);
    }

    #[test]
    fn test_xport_failure_status() {
        let lib = MockLibrary::new();
        lib.fail(Operation::Xport, "Can't make an xport without contents");
        let args = [c("xport")];
        let mut argv: Vec<_> = args.iter().map(|a| a.as_ptr().cast_mut()).collect();
        let (mut xsize, mut start, mut end, mut step, mut cols) = (0, 0, 0, 0, 0);
        let mut legends: *mut *mut c_char = ptr::null_mut();
        let mut data: *mut f64 = ptr::null_mut();

        // SAFETY: all out-pointers reference locals.
        let (status, err) = unsafe {
            xport(
                &lib,
                1,
                argv.as_mut_ptr(),
                &mut xsize,
                &mut start,
                &mut end,
                &mut step,
                &mut cols,
                &mut legends,
                &mut data,
            )
        };
        assert_eq!(status, -1);
        assert_eq!(err.unwrap().to_string(), "Can't make an xport without contents");
        assert!(legends.is_null());
    }

    #[test]
    fn test_array_get_matches_indexing() {
        let owned = [c("a"), c("bb"), c("ccc")];
        let table: Vec<*mut c_char> = owned.iter().map(|s| s.as_ptr().cast_mut()).collect();
        for (i, expected) in table.iter().enumerate() {
            // SAFETY: i < table.len().
            let got = unsafe { array_get(table.as_ptr(), c_int::try_from(i).unwrap()) };
            assert_eq!(got, *expected);
        }
    }
}
