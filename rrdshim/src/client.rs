//! Safe client over the forwarders.
//!
//! [`Client`] turns the builders into argument vectors, calls the matching
//! forwarder, and copies whatever librrd returned into owned Rust values.
//! Every buffer librrd allocates is released with the library's own release
//! function before the call returns, on success and on error alike.

use std::ffi::{CStr, c_char, c_ulong};
use std::path::Path;
use std::ptr;

use crate::args::{ArgVec, path_to_c_string, to_c_string};
use crate::capture::ErrorMessage;
use crate::config::ClientConfig;
use crate::create::Creator;
use crate::error::{ArgumentError, CreateError, LibraryError, Result, ResultError, RrdError};
use crate::fetch::FetchResult;
use crate::forward;
use crate::graph::{GraphInfo, Grapher};
use crate::info::Info;
use crate::library::RrdLibrary;
use crate::schema::ConsolidationFn;
use crate::sys::{rrd_info_t, rrd_value_t, time_t};
use crate::update::Updater;
use crate::xport::{Exporter, XportResult};

#[cfg(feature = "native")]
use crate::library::Native;

/// Runs requests against a librrd implementation.
#[derive(Debug, Clone, Default)]
pub struct Client<L> {
    lib: L,
    config: ClientConfig,
}

#[cfg(feature = "native")]
impl Client<Native> {
    /// A client over the system librrd with the default config.
    pub fn native() -> Self {
        Self::new(Native)
    }

    /// A client over the system librrd.
    pub fn native_with_config(config: ClientConfig) -> Self {
        Self::with_config(Native, config)
    }
}

impl<L: RrdLibrary> Client<L> {
    /// Creates a client with the default config.
    pub fn new(lib: L) -> Self {
        Self::with_config(lib, ClientConfig::default())
    }

    /// Creates a client with the given config.
    pub fn with_config(lib: L, config: ClientConfig) -> Self {
        Self { lib, config }
    }

    /// The config applied to every request.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying library.
    pub fn library(&self) -> &L {
        &self.lib
    }

    /// Creates a database.
    ///
    /// Refuses to replace an existing file unless the creator or the config
    /// allows overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`CreateError::FileExists`] if the file exists and may not be
    /// replaced, an argument error if a definition cannot be marshaled, or
    /// the library's error.
    pub fn create(&self, creator: &Creator) -> Result<()> {
        let path = creator.path();
        if !(creator.is_overwrite() || self.config.overwrite) {
            match std::fs::metadata(path) {
                Ok(_) => {
                    return Err(CreateError::FileExists {
                        path: path.to_path_buf(),
                    }
                    .into());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CreateError::Stat {
                        path: path.to_path_buf(),
                        source,
                    }
                    .into());
                }
            }
        }

        let filename = path_to_c_string(path)?;
        let argv = ArgVec::from_args(creator.definitions())?;
        let argc = argv.argc()?;
        let step = to_c_ulong("step", creator.step())?;
        let start = to_time_t("start", creator.start())?;

        tracing::debug!("rrd create {}: {argc} definitions", path.display());
        // SAFETY: filename and argv own their strings for the whole call.
        let err = unsafe { forward::create(&self.lib, filename.as_ptr(), step, start, argc, argv.as_ptr()) };
        library_result("create", err)
    }

    /// Sends every queued row of `updater` in one call.
    ///
    /// The queue is cleared only if librrd accepts the rows. An empty queue
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an argument error if a row or the template cannot be
    /// marshaled, or the library's error.
    pub fn update(&self, updater: &mut Updater) -> Result<()> {
        if updater.pending().is_empty() {
            return Ok(());
        }

        let filename = path_to_c_string(updater.path())?;
        let template = updater.template().map(to_c_string).transpose()?;
        let argv = ArgVec::from_args(updater.pending())?;
        let argc = argv.argc()?;
        let template_ptr = template.as_ref().map_or(ptr::null(), |t| t.as_ptr());

        tracing::debug!("rrd update {}: {argc} rows", updater.path().display());
        // SAFETY: filename, template and argv own their strings for the
        // whole call; a null template is allowed.
        let err = unsafe {
            forward::update(&self.lib, filename.as_ptr(), template_ptr, argc, argv.as_ptr())
        };
        library_result("update", err)?;
        updater.clear();
        Ok(())
    }

    /// Sends a single row stamped "now".
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn update_now(&self, path: impl AsRef<Path>, values: &[f64]) -> Result<()> {
        let mut updater = Updater::new(path.as_ref());
        updater.cache(None, values);
        self.update(&mut updater)
    }

    /// Reads a database header.
    ///
    /// # Errors
    ///
    /// Returns the library's error, or [`ResultError::NullOutput`] if no
    /// list came back.
    pub fn info(&self, path: impl AsRef<Path>) -> Result<Info> {
        let path = path.as_ref();
        let filename = path_to_c_string(path)?;

        tracing::debug!("rrd info {}", path.display());
        // SAFETY: filename owns its string for the whole call; librrd does
        // not write through it.
        let (list, err) = unsafe { forward::info(&self.lib, filename.as_ptr().cast_mut()) };
        let list = InfoGuard::new(&self.lib, list);
        library_result("info", err)?;
        list.copy("info")
    }

    /// Renders a graph over `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns an argument error if an element cannot be marshaled, the
    /// library's error, or [`ResultError::NullOutput`] if no list came back.
    pub fn graph(&self, grapher: &Grapher, start: i64, end: i64) -> Result<GraphInfo> {
        let mut argv = grapher.args(start, end, self.config.daemon.as_deref())?;
        let argc = argv.argc()?;

        tracing::debug!("rrd graph: {argc} arguments");
        // SAFETY: argv owns its strings and its pointer table for the whole
        // call; librrd may permute the table only.
        let (list, err) = unsafe { forward::graph(&self.lib, argc, argv.as_mut_ptr()) };
        let list = InfoGuard::new(&self.lib, list);
        library_result("graph", err)?;
        Ok(GraphInfo::from_info(&list.copy("graph")?))
    }

    /// Fetches consolidated rows of `cf` over `[start, end]` at `step`
    /// seconds.
    ///
    /// librrd picks the archive and may adjust the range and step; the
    /// result reports what it actually returned.
    ///
    /// # Errors
    ///
    /// Returns an argument error if a value does not fit librrd's types, the
    /// library's error, or a [`ResultError`] if the outputs are unusable.
    pub fn fetch(
        &self,
        path: impl AsRef<Path>,
        cf: ConsolidationFn,
        start: i64,
        end: i64,
        step: u64,
    ) -> Result<FetchResult> {
        let path = path.as_ref();
        let filename = path_to_c_string(path)?;
        let cf_name = to_c_string(cf.as_str())?;
        let mut c_start = to_time_t("start", start)?;
        let mut c_end = to_time_t("end", end)?;
        let mut c_step = to_c_ulong("step", step)?;
        let mut ds_cnt: c_ulong = 0;
        let mut ds_namv: *mut *mut c_char = ptr::null_mut();
        let mut data: *mut rrd_value_t = ptr::null_mut();

        tracing::debug!("rrd fetch {} {cf} {start}..{end} step {step}", path.display());
        // SAFETY: filename and cf_name own their strings for the whole call;
        // every out-pointer references a local.
        let (status, err) = unsafe {
            forward::fetch(
                &self.lib,
                filename.as_ptr(),
                cf_name.as_ptr(),
                &mut c_start,
                &mut c_end,
                &mut c_step,
                &mut ds_cnt,
                &mut ds_namv,
                &mut data,
            )
        };
        let outputs = Outputs {
            lib: &self.lib,
            operation: "fetch",
            start: i64::from(c_start),
            end: i64::from(c_end),
            step: u64::from(c_step),
            columns: u64::from(ds_cnt),
            names: ds_namv,
            data,
        };
        library_result("fetch", err)?;
        if status != 0 {
            return Err(ResultError::Status {
                operation: "fetch",
                status,
            }
            .into());
        }
        let table = outputs.copy()?;

        Ok(FetchResult {
            start: table.start,
            end: table.end,
            step: table.step,
            ds_names: table.names,
            row_count: table.rows,
            values: table.values,
        })
    }

    /// Exports the `XPORT` columns of `exporter` over `[start, end]` at
    /// `step` seconds.
    ///
    /// # Errors
    ///
    /// Returns an argument error if a statement cannot be marshaled, the
    /// library's error, or a [`ResultError`] if the outputs are unusable.
    pub fn xport(&self, exporter: &Exporter, start: i64, end: i64, step: u64) -> Result<XportResult> {
        let mut argv = exporter.args_with_defaults(
            start,
            end,
            step,
            self.config.daemon.as_deref(),
            self.config.max_rows,
        )?;
        let argc = argv.argc()?;
        let mut xsize = 0;
        let mut c_start: time_t = 0;
        let mut c_end: time_t = 0;
        let mut c_step: c_ulong = 0;
        let mut col_cnt: c_ulong = 0;
        let mut legend_v: *mut *mut c_char = ptr::null_mut();
        let mut data: *mut rrd_value_t = ptr::null_mut();

        tracing::debug!("rrd xport: {argc} arguments");
        // SAFETY: argv owns its strings and its pointer table for the whole
        // call; every out-pointer references a local.
        let (status, err) = unsafe {
            forward::xport(
                &self.lib,
                argc,
                argv.as_mut_ptr(),
                &mut xsize,
                &mut c_start,
                &mut c_end,
                &mut c_step,
                &mut col_cnt,
                &mut legend_v,
                &mut data,
            )
        };
        let outputs = Outputs {
            lib: &self.lib,
            operation: "xport",
            start: i64::from(c_start),
            end: i64::from(c_end),
            step: u64::from(c_step),
            columns: u64::from(col_cnt),
            names: legend_v,
            data,
        };
        library_result("xport", err)?;
        if status != 0 {
            return Err(ResultError::Status {
                operation: "xport",
                status,
            }
            .into());
        }
        let table = outputs.copy()?;

        Ok(XportResult {
            start: table.start,
            end: table.end,
            step: table.step,
            legends: table.names,
            row_count: table.rows,
            values: table.values,
        })
    }
}

fn library_result(operation: &'static str, err: Option<ErrorMessage>) -> Result<()> {
    match err {
        None => Ok(()),
        Some(message) => {
            let err = LibraryError::new(operation, &message);
            tracing::warn!("rrd {operation} failed: {}", err.message);
            Err(err.into())
        }
    }
}

fn to_time_t(name: &'static str, value: i64) -> Result<time_t> {
    time_t::try_from(value).map_err(|_| {
        RrdError::from(ArgumentError::OutOfRange {
            name,
            value: i128::from(value),
        })
    })
}

fn to_c_ulong(name: &'static str, value: u64) -> Result<c_ulong> {
    c_ulong::try_from(value).map_err(|_| {
        RrdError::from(ArgumentError::OutOfRange {
            name,
            value: i128::from(value),
        })
    })
}

/// An info list released with `rrd_info_free` on drop.
struct InfoGuard<'a, L: RrdLibrary> {
    lib: &'a L,
    list: *mut rrd_info_t,
}

impl<'a, L: RrdLibrary> InfoGuard<'a, L> {
    fn new(lib: &'a L, list: *mut rrd_info_t) -> Self {
        Self { lib, list }
    }

    fn copy(&self, operation: &'static str) -> Result<Info> {
        if self.list.is_null() {
            return Err(ResultError::NullOutput {
                operation,
                output: "info list",
            }
            .into());
        }
        // SAFETY: the list is live until this guard drops.
        unsafe { Info::from_list(self.list) }
    }
}

impl<L: RrdLibrary> Drop for InfoGuard<'_, L> {
    fn drop(&mut self) {
        if !self.list.is_null() {
            // SAFETY: the list came from this library and is freed once.
            unsafe { self.lib.info_free(self.list) }
        }
    }
}

/// Row-major output buffers of fetch and export, released with
/// `rrd_freemem` on drop.
struct Outputs<'a, L: RrdLibrary> {
    lib: &'a L,
    operation: &'static str,
    start: i64,
    end: i64,
    step: u64,
    columns: u64,
    names: *mut *mut c_char,
    data: *mut rrd_value_t,
}

struct Table {
    start: i64,
    end: i64,
    step: u64,
    names: Vec<String>,
    rows: usize,
    values: Vec<f64>,
}

impl<L: RrdLibrary> Outputs<'_, L> {
    fn length_error(&self, length: u128) -> RrdError {
        ResultError::Length {
            operation: self.operation,
            length,
        }
        .into()
    }

    fn null_error(&self, output: &'static str) -> RrdError {
        ResultError::NullOutput {
            operation: self.operation,
            output,
        }
        .into()
    }

    /// Copies names and values. Row count is `(end - start) / step`.
    fn copy(self) -> Result<Table> {
        let operation = self.operation;
        let columns = usize::try_from(self.columns)
            .map_err(|_| self.length_error(u128::from(self.columns)))?;
        if columns > 0 && self.names.is_null() {
            return Err(self.null_error("name vector"));
        }
        if self.step == 0 {
            return Err(ResultError::ZeroStep { operation }.into());
        }
        if self.end < self.start {
            return Err(ResultError::InvalidRange {
                operation,
                start: self.start,
                end: self.end,
            }
            .into());
        }

        let rows = self.end.abs_diff(self.start) / self.step;
        let length = u128::from(rows) * u128::from(self.columns);
        let rows = usize::try_from(rows).map_err(|_| self.length_error(u128::from(rows)))?;
        let count = usize::try_from(length).map_err(|_| self.length_error(length))?;
        if count > 0 && self.data.is_null() {
            return Err(self.null_error("data buffer"));
        }

        let names = (0..columns)
            .map(|i| {
                // SAFETY: the vector holds `columns` entries.
                let name = unsafe { *self.names.add(i) };
                if name.is_null() {
                    String::new()
                } else {
                    // SAFETY: entries are NUL-terminated strings owned by
                    // the library until this value drops.
                    unsafe { CStr::from_ptr(name) }
                        .to_string_lossy()
                        .into_owned()
                }
            })
            .collect();
        let values = if count == 0 {
            Vec::new()
        } else {
            // SAFETY: the buffer holds rows * columns values.
            unsafe { std::slice::from_raw_parts(self.data, count) }.to_vec()
        };

        Ok(Table {
            start: self.start,
            end: self.end,
            step: self.step,
            names,
            rows,
            values,
        })
    }
}

impl<L: RrdLibrary> Drop for Outputs<'_, L> {
    fn drop(&mut self) {
        if !self.names.is_null() {
            let columns = usize::try_from(self.columns).unwrap_or(0);
            for i in 0..columns {
                // SAFETY: the vector holds `columns` entries, each freed once.
                unsafe { self.lib.free_mem(self.names.add(i).read().cast()) }
            }
            // SAFETY: the vector itself came from this library.
            unsafe { self.lib.free_mem(self.names.cast()) }
        }
        // SAFETY: null or a buffer from this library, freed once.
        unsafe { self.lib.free_mem(self.data.cast()) }
    }
}
