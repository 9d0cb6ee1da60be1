//! The seam between the forwarders and librrd.
//!
//! [`RrdLibrary`] lists exactly the librrd entry points the shim calls. The
//! forwarders in [`forward`](crate::forward) are generic over it, so the same
//! clear/call/capture protocol runs against the real library ([`Native`],
//! feature `native`) or against `MockLibrary` (feature `mock`) in
//! tests.
//!
//! Error state must behave like librrd's: one slot per thread, shared by
//! every handle on that thread.

use std::ffi::{CStr, c_char, c_int, c_ulong, c_void};

use crate::sys::{rrd_info_t, rrd_value_t, time_t};

/// Entry points of a librrd-compatible library.
///
/// The `unsafe` methods forward raw pointers unchanged; callers must uphold
/// the pointer contracts of the librrd function of the same name.
pub trait RrdLibrary {
    /// Clears this thread's error state (`rrd_clear_error`).
    fn clear_error(&self);

    /// Whether this thread's error state is set (`rrd_test_error`).
    fn test_error(&self) -> bool;

    /// This thread's error message (`rrd_get_error`).
    ///
    /// The pointer stays valid only until the next library call on this
    /// thread.
    fn get_error(&self) -> *const c_char;

    /// Duplicates an error message into a buffer released with `libc::free`.
    ///
    /// Returns null when allocation fails.
    fn duplicate_error(&self, message: &CStr) -> *mut c_char {
        // SAFETY: `message` is a valid NUL-terminated string for the duration
        // of the call; strdup copies it into a fresh malloc buffer.
        unsafe { libc::strdup(message.as_ptr()) }
    }

    /// `rrd_create_r`.
    ///
    /// # Safety
    ///
    /// `filename` must be a valid C string and `argv` must point to `argc`
    /// valid C strings.
    unsafe fn create(
        &self,
        filename: *const c_char,
        step: c_ulong,
        start: time_t,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int;

    /// `rrd_update_r`.
    ///
    /// # Safety
    ///
    /// `filename` must be a valid C string, `template` a valid C string or
    /// null, and `argv` must point to `argc` valid C strings.
    unsafe fn update(
        &self,
        filename: *const c_char,
        template: *const c_char,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int;

    /// `rrd_graph_v`.
    ///
    /// # Safety
    ///
    /// `argv` must point to `argc` valid C strings. The library may permute
    /// the pointer table.
    unsafe fn graph(&self, argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t;

    /// `rrd_info_r`, or `rrd_info` with `{NULL, filename}` on libraries that
    /// lack the direct entry point.
    ///
    /// # Safety
    ///
    /// `filename` must be a valid C string.
    unsafe fn info(&self, filename: *mut c_char) -> *mut rrd_info_t;

    /// `rrd_fetch_r`.
    ///
    /// # Safety
    ///
    /// `filename` and `cf` must be valid C strings; every other pointer must
    /// be valid for writes.
    #[allow(clippy::too_many_arguments)]
    unsafe fn fetch(
        &self,
        filename: *const c_char,
        cf: *const c_char,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        ds_cnt: *mut c_ulong,
        ds_namv: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int;

    /// `rrd_xport`.
    ///
    /// # Safety
    ///
    /// `argv` must point to `argc` valid C strings; every other pointer must
    /// be valid for writes.
    #[allow(clippy::too_many_arguments)]
    unsafe fn xport(
        &self,
        argc: c_int,
        argv: *mut *mut c_char,
        xsize: *mut c_int,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        col_cnt: *mut c_ulong,
        legend_v: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int;

    /// `rrd_info_free`.
    ///
    /// # Safety
    ///
    /// `info` must be a list returned by [`graph`](Self::graph) or
    /// [`info`](Self::info) of this library, not yet freed.
    unsafe fn info_free(&self, info: *mut rrd_info_t);

    /// `rrd_freemem`.
    ///
    /// # Safety
    ///
    /// `mem` must be null or a buffer allocated by this library, not yet
    /// freed.
    unsafe fn free_mem(&self, mem: *mut c_void);
}

impl<L: RrdLibrary + ?Sized> RrdLibrary for &L {
    fn clear_error(&self) {
        (**self).clear_error();
    }

    fn test_error(&self) -> bool {
        (**self).test_error()
    }

    fn get_error(&self) -> *const c_char {
        (**self).get_error()
    }

    fn duplicate_error(&self, message: &CStr) -> *mut c_char {
        (**self).duplicate_error(message)
    }

    unsafe fn create(
        &self,
        filename: *const c_char,
        step: c_ulong,
        start: time_t,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).create(filename, step, start, argc, argv) }
    }

    unsafe fn update(
        &self,
        filename: *const c_char,
        template: *const c_char,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).update(filename, template, argc, argv) }
    }

    unsafe fn graph(&self, argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).graph(argc, argv) }
    }

    unsafe fn info(&self, filename: *mut c_char) -> *mut rrd_info_t {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).info(filename) }
    }

    unsafe fn fetch(
        &self,
        filename: *const c_char,
        cf: *const c_char,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        ds_cnt: *mut c_ulong,
        ds_namv: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).fetch(filename, cf, start, end, step, ds_cnt, ds_namv, data) }
    }

    unsafe fn xport(
        &self,
        argc: c_int,
        argv: *mut *mut c_char,
        xsize: *mut c_int,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        col_cnt: *mut c_ulong,
        legend_v: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe {
            (**self).xport(
                argc, argv, xsize, start, end, step, col_cnt, legend_v, data,
            )
        }
    }

    unsafe fn info_free(&self, info: *mut rrd_info_t) {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).info_free(info) }
    }

    unsafe fn free_mem(&self, mem: *mut c_void) {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).free_mem(mem) }
    }
}

/// The system librrd.
///
/// Zero-sized: all state, including the per-thread error slot, lives inside
/// the library.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

#[cfg(feature = "native")]
impl Native {
    /// Name of the entry point [`RrdLibrary::info`] calls on this build.
    pub const fn info_entry_point() -> &'static str {
        if cfg!(rrd_info_r) { "rrd_info_r" } else { "rrd_info" }
    }
}

#[cfg(feature = "native")]
impl RrdLibrary for Native {
    fn clear_error(&self) {
        // SAFETY: no preconditions; touches only this thread's error slot.
        unsafe { crate::sys::rrd_clear_error() }
    }

    fn test_error(&self) -> bool {
        // SAFETY: no preconditions; reads only this thread's error slot.
        unsafe { crate::sys::rrd_test_error() != 0 }
    }

    fn get_error(&self) -> *const c_char {
        // SAFETY: no preconditions; returns this thread's message buffer.
        unsafe { crate::sys::rrd_get_error() }
    }

    unsafe fn create(
        &self,
        filename: *const c_char,
        step: c_ulong,
        start: time_t,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: the caller guarantees the pointer contract of rrd_create_r.
        unsafe { crate::sys::rrd_create_r(filename, step, start, argc, argv) }
    }

    unsafe fn update(
        &self,
        filename: *const c_char,
        template: *const c_char,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: the caller guarantees the pointer contract of rrd_update_r.
        unsafe { crate::sys::rrd_update_r(filename, template, argc, argv) }
    }

    unsafe fn graph(&self, argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t {
        // SAFETY: the caller guarantees the pointer contract of rrd_graph_v.
        unsafe { crate::sys::rrd_graph_v(argc, argv) }
    }

    #[cfg(rrd_info_r)]
    unsafe fn info(&self, filename: *mut c_char) -> *mut rrd_info_t {
        // SAFETY: the caller guarantees `filename` is a valid C string.
        unsafe { crate::sys::rrd_info_r(filename) }
    }

    #[cfg(not(rrd_info_r))]
    unsafe fn info(&self, filename: *mut c_char) -> *mut rrd_info_t {
        // librrd 1.3.x does not export rrd_info_r.
        let mut argv = info_argv(filename);
        let argc = c_int::try_from(argv.len()).unwrap_or(c_int::MAX);
        // SAFETY: argv outlives the call; argv[0] is the program-name slot
        // which rrd_info skips.
        unsafe { crate::sys::rrd_info(argc, argv.as_mut_ptr()) }
    }

    unsafe fn fetch(
        &self,
        filename: *const c_char,
        cf: *const c_char,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        ds_cnt: *mut c_ulong,
        ds_namv: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int {
        // SAFETY: the caller guarantees the pointer contract of rrd_fetch_r.
        unsafe { crate::sys::rrd_fetch_r(filename, cf, start, end, step, ds_cnt, ds_namv, data) }
    }

    unsafe fn xport(
        &self,
        argc: c_int,
        argv: *mut *mut c_char,
        xsize: *mut c_int,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        col_cnt: *mut c_ulong,
        legend_v: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int {
        // SAFETY: the caller guarantees the pointer contract of rrd_xport.
        unsafe {
            crate::sys::rrd_xport(
                argc, argv, xsize, start, end, step, col_cnt, legend_v, data,
            )
        }
    }

    unsafe fn info_free(&self, info: *mut rrd_info_t) {
        // SAFETY: the caller guarantees `info` came from this library.
        unsafe { crate::sys::rrd_info_free(info) }
    }

    unsafe fn free_mem(&self, mem: *mut c_void) {
        // SAFETY: the caller guarantees `mem` came from this library.
        unsafe { crate::sys::rrd_freemem(mem) }
    }
}

/// Argument vector for argv-style `rrd_info`: an empty program-name slot,
/// then the file.
#[cfg(any(test, all(feature = "native", not(rrd_info_r))))]
fn info_argv(filename: *mut c_char) -> [*mut c_char; 2] {
    [std::ptr::null_mut(), filename]
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;

    #[test]
    fn test_info_argv_skips_program_name() {
        let file = CString::new("load.rrd").unwrap().into_raw();
        let argv = info_argv(file);
        assert!(argv[0].is_null());
        assert_eq!(argv[1], file);

        // SAFETY: argv[1] is the pointer from into_raw, reclaimed once.
        let back = unsafe { CString::from_raw(argv[1]) };
        assert_eq!(back.to_str().unwrap(), "load.rrd");
    }
}
