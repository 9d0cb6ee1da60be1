//! C ABI exports.
//!
//! Every `rrdshim_*` operation returns null when librrd reported no error,
//! or a caller-owned copy of the library's message otherwise. Release that
//! copy with [`rrdshim_error_free`] (or `free`). All other outputs are
//! librrd's and are released with librrd's own functions, exactly as if the
//! library had been called directly.
//!
//! The operation exports need the system librrd and exist only with the
//! `native` feature; the helpers below them are always exported.

#[cfg(feature = "native")]
use std::ffi::c_ulong;
use std::ffi::{c_char, c_int};

use crate::capture::ErrorMessage;
use crate::forward;
#[cfg(feature = "native")]
use crate::library::Native;
#[cfg(feature = "native")]
use crate::sys::{rrd_info_t, rrd_value_t, time_t};

#[cfg(feature = "native")]
fn into_raw(err: Option<ErrorMessage>) -> *mut c_char {
    err.map_or(std::ptr::null_mut(), ErrorMessage::into_raw)
}

/// Creates a database with `rrd_create_r`.
///
/// # Safety
///
/// `filename` must be a valid C string and `argv` must point to `argc` valid
/// C strings.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_create(
    filename: *const c_char,
    step: c_ulong,
    start: time_t,
    argc: c_int,
    argv: *const *const c_char,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    into_raw(unsafe { forward::create(&Native, filename, step, start, argc, argv) })
}

/// Updates a database with `rrd_update_r`.
///
/// # Safety
///
/// `filename` must be a valid C string, `template` a valid C string or null,
/// and `argv` must point to `argc` valid C strings.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_update(
    filename: *const c_char,
    template: *const c_char,
    argc: c_int,
    argv: *const *const c_char,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    into_raw(unsafe { forward::update(&Native, filename, template, argc, argv) })
}

/// Renders a graph with `rrd_graph_v`, storing the info list in `*ret`.
///
/// # Safety
///
/// `ret` must be null or valid for writes; `argv` must point to `argc` valid
/// C strings.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_graph(
    ret: *mut *mut rrd_info_t,
    argc: c_int,
    argv: *mut *mut c_char,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    let (info, err) = unsafe { forward::graph(&Native, argc, argv) };
    if !ret.is_null() {
        // SAFETY: ret is non-null and valid for writes.
        unsafe { ret.write(info) };
    }
    into_raw(err)
}

/// Reads a database header, storing the info list in `*ret`.
///
/// # Safety
///
/// `ret` must be null or valid for writes; `filename` must be a valid C
/// string.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_info(
    ret: *mut *mut rrd_info_t,
    filename: *mut c_char,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    let (info, err) = unsafe { forward::info(&Native, filename) };
    if !ret.is_null() {
        // SAFETY: ret is non-null and valid for writes.
        unsafe { ret.write(info) };
    }
    into_raw(err)
}

/// Fetches rows with `rrd_fetch_r`, storing its status in `*ret`.
///
/// # Safety
///
/// `ret` must be null or valid for writes; `filename` and `cf` must be valid
/// C strings; every other pointer must be valid for reads and writes.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn rrdshim_fetch(
    ret: *mut c_int,
    filename: *mut c_char,
    cf: *const c_char,
    start: *mut time_t,
    end: *mut time_t,
    step: *mut c_ulong,
    ds_cnt: *mut c_ulong,
    ds_namv: *mut *mut *mut c_char,
    data: *mut *mut rrd_value_t,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    let (status, err) = unsafe {
        forward::fetch(
            &Native,
            filename.cast_const(),
            cf,
            start,
            end,
            step,
            ds_cnt,
            ds_namv,
            data,
        )
    };
    if !ret.is_null() {
        // SAFETY: ret is non-null and valid for writes.
        unsafe { ret.write(status) };
    }
    into_raw(err)
}

/// Exports series with `rrd_xport`, storing its status in `*ret`.
///
/// # Safety
///
/// `ret` must be null or valid for writes; `argv` must point to `argc` valid
/// C strings; every other pointer must be valid for writes.
#[cfg(feature = "native")]
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn rrdshim_xport(
    ret: *mut c_int,
    argc: c_int,
    argv: *mut *mut c_char,
    xsize: *mut c_int,
    start: *mut time_t,
    end: *mut time_t,
    step: *mut c_ulong,
    col_cnt: *mut c_ulong,
    legend_v: *mut *mut *mut c_char,
    data: *mut *mut rrd_value_t,
) -> *mut c_char {
    // SAFETY: forwarded with the caller's guarantees.
    let (status, err) = unsafe {
        forward::xport(
            &Native, argc, argv, xsize, start, end, step, col_cnt, legend_v, data,
        )
    };
    if !ret.is_null() {
        // SAFETY: ret is non-null and valid for writes.
        unsafe { ret.write(status) };
    }
    into_raw(err)
}

/// Returns `values[i]`.
///
/// # Safety
///
/// `values` must point to an array with more than `i` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_array_get(values: *mut *mut c_char, i: c_int) -> *mut c_char {
    // SAFETY: the caller guarantees `i` is in bounds.
    unsafe { forward::array_get(values.cast_const(), i) }
}

/// Releases an error string returned by an `rrdshim_*` function.
///
/// # Safety
///
/// `err` must be null or a string returned by this library that has not
/// been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rrdshim_error_free(err: *mut c_char) {
    // SAFETY: the caller hands back ownership of a copy made by
    // capture_error; from_raw ignores null.
    drop(unsafe { ErrorMessage::from_raw(err) });
}

/// Version of this library. Static; never freed.
#[unsafe(no_mangle)]
pub extern "C" fn rrdshim_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;
    use crate::capture::capture_error;
    use crate::mock::MockLibrary;

    #[test]
    fn test_error_free_null() {
        // SAFETY: null is a documented no-op.
        unsafe { rrdshim_error_free(std::ptr::null_mut()) };
    }

    #[test]
    fn test_error_free_releases_capture() {
        let lib = MockLibrary::new();
        lib.set_error("handed to C");
        let raw = capture_error(&lib).unwrap().into_raw();
        // SAFETY: raw came from into_raw and is freed once.
        unsafe { rrdshim_error_free(raw) };
    }

    #[test]
    fn test_array_get() {
        let owned = [CString::new("in").unwrap(), CString::new("out").unwrap()];
        let mut table: Vec<*mut c_char> = owned.iter().map(|s| s.as_ptr().cast_mut()).collect();
        // SAFETY: index 1 is in bounds.
        let got = unsafe { CStr::from_ptr(rrdshim_array_get(table.as_mut_ptr(), 1)) };
        assert_eq!(got.to_str().unwrap(), "out");
    }

    #[test]
    fn test_version() {
        // SAFETY: the version string is static and NUL-terminated.
        let version = unsafe { CStr::from_ptr(rrdshim_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
