//! Raw librrd declarations.
//!
//! The type definitions mirror `rrd.h` and are always available so that
//! non-native [`RrdLibrary`](crate::library::RrdLibrary) implementations can
//! build the same structures librrd returns. The function declarations are
//! only compiled with the `native` feature; linking is arranged by the build
//! script.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uchar, c_ulong};

/// librrd's sample value type.
pub type rrd_value_t = f64;

/// `time_t` as seen by librrd.
pub type time_t = libc::time_t;

/// Discriminant of [`rrd_infoval_t`]. Kept as a plain integer since librrd may
/// hand back values this crate does not know about.
pub type rrd_info_type_t = c_int;

/// `rrd_infoval_t` holds an `rrd_value_t`.
pub const RD_I_VAL: rrd_info_type_t = 0;
/// `rrd_infoval_t` holds an `unsigned long` counter.
pub const RD_I_CNT: rrd_info_type_t = 1;
/// `rrd_infoval_t` holds a NUL-terminated string.
pub const RD_I_STR: rrd_info_type_t = 2;
/// `rrd_infoval_t` holds an `int`.
pub const RD_I_INT: rrd_info_type_t = 3;
/// `rrd_infoval_t` holds an [`rrd_blob_t`].
pub const RD_I_BLO: rrd_info_type_t = 4;

/// Binary payload of an info entry (the rendered image of a graph call).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct rrd_blob_t {
    /// Payload size in bytes.
    pub size: c_ulong,
    /// Payload start.
    pub ptr: *mut c_uchar,
}

/// Value of an info entry, tagged by [`rrd_info_t::type_`].
#[repr(C)]
#[derive(Clone, Copy)]
pub union rrd_infoval_t {
    /// Counter value (`RD_I_CNT`).
    pub u_cnt: c_ulong,
    /// Sample value (`RD_I_VAL`).
    pub u_val: rrd_value_t,
    /// String value (`RD_I_STR`).
    pub u_str: *mut c_char,
    /// Integer value (`RD_I_INT`).
    pub u_int: c_int,
    /// Blob value (`RD_I_BLO`).
    pub u_blo: rrd_blob_t,
}

/// One node of the singly linked list returned by info and graph calls.
#[repr(C)]
pub struct rrd_info_t {
    /// Entry key, e.g. `ds[load].index`.
    pub key: *mut c_char,
    /// Which union member of `value` is live.
    pub type_: rrd_info_type_t,
    /// Entry value.
    pub value: rrd_infoval_t,
    /// Next node, or null.
    pub next: *mut rrd_info_t,
}

#[cfg(feature = "native")]
#[allow(missing_docs)]
unsafe extern "C" {
    pub fn rrd_clear_error();
    pub fn rrd_test_error() -> c_int;
    pub fn rrd_get_error() -> *mut c_char;

    pub fn rrd_create_r(
        filename: *const c_char,
        pdp_step: c_ulong,
        last_up: time_t,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int;

    pub fn rrd_update_r(
        filename: *const c_char,
        template: *const c_char,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int;

    pub fn rrd_graph_v(argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t;

    pub fn rrd_info(argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t;

    #[cfg(rrd_info_r)]
    pub fn rrd_info_r(filename: *mut c_char) -> *mut rrd_info_t;

    pub fn rrd_info_free(info: *mut rrd_info_t);

    pub fn rrd_fetch_r(
        filename: *const c_char,
        cf: *const c_char,
        start: *mut time_t,
        end: *mut time_t,
        step: *mut c_ulong,
        ds_cnt: *mut c_ulong,
        ds_namv: *mut *mut *mut c_char,
        data: *mut *mut rrd_value_t,
    ) -> c_int;

    pub fn rrd_xport(
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

    pub fn rrd_freemem(mem: *mut std::ffi::c_void);
}
