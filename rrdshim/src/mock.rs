//! An in-process stand-in for librrd.
//!
//! [`MockLibrary`] implements [`RrdLibrary`] without touching the filesystem.
//! It records every call with its arguments rendered as strings, fails
//! operations on request, hands back scripted outputs allocated the way librrd
//! allocates them, and counts outstanding allocations so tests can check that
//! every buffer is released exactly once.
//!
//! Like librrd, the error slot is thread-local and shared by every mock on
//! the same thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int, c_uchar, c_ulong, c_void};
use std::ptr;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::info::{Info, InfoValue};
use crate::library::RrdLibrary;
use crate::sys::{self, rrd_info_t, rrd_infoval_t, rrd_value_t, time_t};

thread_local! {
    static ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// A forwarded librrd entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `rrd_create_r`.
    Create,
    /// `rrd_update_r`.
    Update,
    /// `rrd_graph_v`.
    Graph,
    /// `rrd_info_r`.
    Info,
    /// `rrd_fetch_r`.
    Fetch,
    /// `rrd_xport`.
    Xport,
}

/// One recorded call.
///
/// `args` holds, per operation:
/// - create: filename, step, start, then argv
/// - update: filename, template (empty when null), then argv
/// - graph, xport: argv
/// - info: filename
/// - fetch: filename, cf, start, end, step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Which entry point was called.
    pub operation: Operation,
    /// Arguments rendered as strings.
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
struct Table {
    start: time_t,
    end: time_t,
    step: c_ulong,
    names: Vec<String>,
    values: Vec<f64>,
}

#[derive(Debug, Default)]
struct State {
    failures: HashMap<Operation, String>,
    statuses: HashMap<Operation, c_int>,
    calls: Vec<Call>,
    info: Option<Info>,
    graph: Option<Info>,
    fetch: Option<Table>,
    xport: Option<Table>,
    fail_allocation: bool,
}

/// A scriptable [`RrdLibrary`].
#[derive(Debug, Default)]
pub struct MockLibrary {
    state: Mutex<State>,
    outstanding: AtomicIsize,
}

impl MockLibrary {
    /// Creates a mock where every operation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail with `message` until [`succeed`](Self::succeed).
    pub fn fail(&self, operation: Operation, message: &str) {
        self.lock().failures.insert(operation, message.to_string());
    }

    /// Lets `operation` succeed again.
    pub fn succeed(&self, operation: Operation) {
        self.lock().failures.remove(&operation);
    }

    /// Makes fetch or xport return `status` after writing their outputs,
    /// without setting the error state.
    pub fn set_status(&self, operation: Operation, status: c_int) {
        self.lock().statuses.insert(operation, status);
    }

    /// Sets this thread's error state directly, as an earlier unrelated call
    /// would have.
    pub fn set_error(&self, message: &str) {
        set_thread_error(message);
    }

    /// Makes error duplication report allocation failure.
    pub fn fail_allocation(&self, fail: bool) {
        self.lock().fail_allocation = fail;
    }

    /// Entries returned by info calls. Without it, info returns a single
    /// `filename` entry naming the requested file.
    pub fn set_info(&self, info: Info) {
        self.lock().info = Some(info);
    }

    /// Entries returned by graph calls. Without it, graph returns a nominal
    /// image size.
    pub fn set_graph(&self, info: Info) {
        self.lock().graph = Some(info);
    }

    /// Output written by fetch calls. Without it, fetch reports no data
    /// sources and leaves the range untouched.
    pub fn set_fetch_output(
        &self,
        start: time_t,
        end: time_t,
        step: c_ulong,
        names: &[&str],
        values: &[f64],
    ) {
        self.lock().fetch = Some(table(start, end, step, names, values));
    }

    /// Output written by xport calls.
    pub fn set_xport_output(
        &self,
        start: time_t,
        end: time_t,
        step: c_ulong,
        legends: &[&str],
        values: &[f64],
    ) {
        self.lock().xport = Some(table(start, end, step, legends, values));
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Buffers and lists handed out and not yet released.
    pub fn outstanding_allocations(&self) -> isize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Builds an info list the way librrd does; release it with
    /// [`RrdLibrary::info_free`] on this mock.
    pub fn build_list(&self, info: &Info) -> *mut rrd_info_t {
        let entries: Vec<_> = info.iter().collect();
        let mut head: *mut rrd_info_t = ptr::null_mut();
        for (key, value) in entries.into_iter().rev() {
            let (type_, value) = encode_value(value);
            head = Box::into_raw(Box::new(rrd_info_t {
                key: c_string_without_nuls(key).into_raw(),
                type_,
                value,
                next: head,
            }));
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        head
    }

    fn status(&self, operation: Operation) -> c_int {
        self.lock().statuses.get(&operation).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a call and reports whether it should fail, setting the error
    /// state if so.
    fn record(&self, operation: Operation, args: Vec<String>) -> bool {
        let mut state = self.lock();
        state.calls.push(Call { operation, args });
        match state.failures.get(&operation) {
            Some(message) => {
                set_thread_error(message);
                true
            }
            None => false,
        }
    }

    /// Allocates a librrd-style string vector.
    fn alloc_strings(&self, strings: &[String]) -> *mut *mut c_char {
        let slots = strings.len().max(1);
        // SAFETY: plain allocation; checked for null below.
        let table =
            unsafe { libc::malloc(slots * size_of::<*mut c_char>()) }.cast::<*mut c_char>();
        if table.is_null() {
            return table;
        }
        for (i, s) in strings.iter().enumerate() {
            let owned = c_string_without_nuls(s);
            // SAFETY: i < slots; strdup copies the live CString.
            unsafe { table.add(i).write(libc::strdup(owned.as_ptr())) };
        }
        self.outstanding
            .fetch_add(isize::try_from(strings.len() + 1).unwrap_or(isize::MAX), Ordering::SeqCst);
        table
    }

    /// Allocates a librrd-style value buffer.
    fn alloc_values(&self, values: &[f64]) -> *mut rrd_value_t {
        let slots = values.len().max(1);
        // SAFETY: plain allocation; checked for null below.
        let data = unsafe { libc::malloc(slots * size_of::<rrd_value_t>()) }.cast::<rrd_value_t>();
        if data.is_null() {
            return data;
        }
        // SAFETY: data has room for values.len() elements.
        unsafe { ptr::copy_nonoverlapping(values.as_ptr(), data, values.len()) };
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        data
    }
}

impl RrdLibrary for MockLibrary {
    fn clear_error(&self) {
        ERROR.with(|slot| *slot.borrow_mut() = None);
    }

    fn test_error(&self) -> bool {
        ERROR.with(|slot| slot.borrow().is_some())
    }

    fn get_error(&self) -> *const c_char {
        ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |m| m.as_ptr()))
    }

    fn duplicate_error(&self, message: &CStr) -> *mut c_char {
        if self.lock().fail_allocation {
            return ptr::null_mut();
        }
        // SAFETY: message is a valid C string for the duration of the call.
        unsafe { libc::strdup(message.as_ptr()) }
    }

    unsafe fn create(
        &self,
        filename: *const c_char,
        step: c_ulong,
        start: time_t,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: caller passes valid C strings.
        let mut args = vec![unsafe { lossy(filename) }, step.to_string(), start.to_string()];
        // SAFETY: caller passes argc valid C strings.
        args.extend(unsafe { collect_args(argc, argv) });
        if self.record(Operation::Create, args) { -1 } else { 0 }
    }

    unsafe fn update(
        &self,
        filename: *const c_char,
        template: *const c_char,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int {
        // SAFETY: caller passes valid C strings or a null template.
        let mut args = vec![unsafe { lossy(filename) }, unsafe { lossy(template) }];
        // SAFETY: caller passes argc valid C strings.
        args.extend(unsafe { collect_args(argc, argv) });
        if self.record(Operation::Update, args) { -1 } else { 0 }
    }

    unsafe fn graph(&self, argc: c_int, argv: *mut *mut c_char) -> *mut rrd_info_t {
        // SAFETY: caller passes argc valid C strings.
        let args = unsafe { collect_args(argc, argv.cast_const().cast()) };
        if self.record(Operation::Graph, args) {
            return ptr::null_mut();
        }
        let info = self.lock().graph.clone().unwrap_or_else(|| {
            Info::from_entries([
                ("image_width", InfoValue::Count(481)),
                ("image_height", InfoValue::Count(141)),
            ])
        });
        self.build_list(&info)
    }

    unsafe fn info(&self, filename: *mut c_char) -> *mut rrd_info_t {
        // SAFETY: caller passes a valid C string.
        let name = unsafe { lossy(filename) };
        if self.record(Operation::Info, vec![name.clone()]) {
            return ptr::null_mut();
        }
        let info = self
            .lock()
            .info
            .clone()
            .unwrap_or_else(|| Info::from_entries([("filename", InfoValue::Str(name))]));
        self.build_list(&info)
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
        // SAFETY: caller passes valid C strings and readable in/out pointers.
        let args = unsafe {
            vec![
                lossy(filename),
                lossy(cf),
                start.read().to_string(),
                end.read().to_string(),
                step.read().to_string(),
            ]
        };
        if self.record(Operation::Fetch, args) {
            return -1;
        }
        let Some(output) = self.lock().fetch.clone() else {
            // SAFETY: caller passes writable out pointers.
            unsafe {
                ds_cnt.write(0);
                ds_namv.write(ptr::null_mut());
                data.write(ptr::null_mut());
            }
            return 0;
        };
        // SAFETY: caller passes writable out pointers.
        unsafe {
            start.write(output.start);
            end.write(output.end);
            step.write(output.step);
            ds_cnt.write(c_ulong::try_from(output.names.len()).unwrap_or(c_ulong::MAX));
            ds_namv.write(self.alloc_strings(&output.names));
            data.write(self.alloc_values(&output.values));
        }
        self.status(Operation::Fetch)
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
        // SAFETY: caller passes argc valid C strings.
        let args = unsafe { collect_args(argc, argv.cast_const().cast()) };
        if self.record(Operation::Xport, args) {
            return -1;
        }
        let output = self.lock().xport.clone().unwrap_or(Table {
            start: 0,
            end: 0,
            step: 1,
            names: Vec::new(),
            values: Vec::new(),
        });
        let rows = output
            .values
            .len()
            .checked_div(output.names.len())
            .unwrap_or(0);
        // SAFETY: caller passes writable out pointers.
        unsafe {
            xsize.write(c_int::try_from(rows).unwrap_or(c_int::MAX));
            start.write(output.start);
            end.write(output.end);
            step.write(output.step);
            col_cnt.write(c_ulong::try_from(output.names.len()).unwrap_or(c_ulong::MAX));
            legend_v.write(self.alloc_strings(&output.names));
            data.write(self.alloc_values(&output.values));
        }
        self.status(Operation::Xport)
    }

    unsafe fn info_free(&self, info: *mut rrd_info_t) {
        if info.is_null() {
            return;
        }
        let mut node = info;
        while !node.is_null() {
            // SAFETY: every node, key, string and blob was created by
            // build_list from a Box or CString and is reclaimed once here.
            unsafe {
                let boxed = Box::from_raw(node);
                drop(CString::from_raw(boxed.key));
                match boxed.type_ {
                    sys::RD_I_STR => drop(CString::from_raw(boxed.value.u_str)),
                    sys::RD_I_BLO => {
                        let blob = boxed.value.u_blo;
                        let len = usize::try_from(blob.size).unwrap_or(0);
                        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(blob.ptr, len)));
                    }
                    _ => {}
                }
                node = boxed.next;
            }
        }
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    unsafe fn free_mem(&self, mem: *mut c_void) {
        if mem.is_null() {
            return;
        }
        // SAFETY: mem came from malloc or strdup in this mock.
        unsafe { libc::free(mem) };
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

fn set_thread_error(message: &str) {
    ERROR.with(|slot| *slot.borrow_mut() = Some(c_string_without_nuls(message)));
}

fn table(start: time_t, end: time_t, step: c_ulong, names: &[&str], values: &[f64]) -> Table {
    Table {
        start,
        end,
        step,
        names: names.iter().map(|n| (*n).to_string()).collect(),
        values: values.to_vec(),
    }
}

/// A C string with any NUL bytes dropped.
fn c_string_without_nuls(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

fn encode_value(value: &InfoValue) -> (sys::rrd_info_type_t, rrd_infoval_t) {
    match value {
        InfoValue::Value(v) => (sys::RD_I_VAL, rrd_infoval_t { u_val: *v }),
        InfoValue::Count(c) => (
            sys::RD_I_CNT,
            rrd_infoval_t {
                u_cnt: c_ulong::try_from(*c).unwrap_or(c_ulong::MAX),
            },
        ),
        InfoValue::Int(i) => (
            sys::RD_I_INT,
            rrd_infoval_t {
                u_int: c_int::try_from(*i).unwrap_or(c_int::MAX),
            },
        ),
        InfoValue::Str(s) => (
            sys::RD_I_STR,
            rrd_infoval_t {
                u_str: c_string_without_nuls(s).into_raw(),
            },
        ),
        InfoValue::Blob(bytes) => {
            let boxed = bytes.clone().into_boxed_slice();
            let size = c_ulong::try_from(boxed.len()).unwrap_or(c_ulong::MAX);
            let ptr = Box::into_raw(boxed).cast::<c_uchar>();
            (
                sys::RD_I_BLO,
                rrd_infoval_t {
                    u_blo: sys::rrd_blob_t { size, ptr },
                },
            )
        }
    }
}

/// Decodes a C string, treating null as empty.
///
/// # Safety
///
/// `ptr` must be null or a valid C string.
unsafe fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Decodes an argument vector.
///
/// # Safety
///
/// `argv` must point to `argc` valid C strings (or nulls).
unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    let count = usize::try_from(argc).unwrap_or(0);
    if argv.is_null() {
        return Vec::new();
    }
    (0..count)
        // SAFETY: i < argc, each entry valid per the caller.
        .map(|i| unsafe { lossy(argv.add(i).read()) })
        .collect()
}
