//! Builder and results for `rrd_xport`.
//!
//! An [`Exporter`] collects `DEF`, `CDEF` and `XPORT` statements; each
//! `XPORT` becomes one column of the [`XportResult`].

use std::path::Path;

use serde::Serialize;

use crate::args::{ArgVec, escape_colons};
use crate::error::Result;
use crate::fetch::row_iter;
use crate::schema::ConsolidationFn;

/// A pending export.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use rrdshim::schema::ConsolidationFn;
/// use rrdshim::xport::Exporter;
///
/// let mut xport = Exporter::new();
/// xport
///     .def("load", Path::new("load.rrd"), "shortterm", ConsolidationFn::Average)
///     .cdef("pct", "load,100,*")
///     .xport("pct", "load percent");
///
/// let argv = xport.args(0, 3600, 60, None).unwrap();
/// assert_eq!(
///     argv.iter().collect::<Vec<_>>(),
///     [
///         "xport", "-s", "0", "-e", "3600", "--step", "60",
///         "DEF:load=load.rrd:shortterm:AVERAGE",
///         "CDEF:pct=load,100,*",
///         "XPORT:pct:load percent",
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exporter {
    max_rows: Option<u32>,
    daemon: Option<String>,
    elements: Vec<String>,
}

impl Exporter {
    /// Creates an empty export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of returned rows; librrd picks a coarser step if
    /// needed.
    pub fn set_max_rows(&mut self, rows: u32) -> &mut Self {
        self.max_rows = Some(rows);
        self
    }

    /// Reads through an rrdcached daemon.
    pub fn set_daemon(&mut self, address: impl Into<String>) -> &mut Self {
        self.daemon = Some(address.into());
        self
    }

    /// `DEF:vname=path:ds:CF`.
    pub fn def(&mut self, vname: &str, path: &Path, ds: &str, cf: ConsolidationFn) -> &mut Self {
        self.elements.push(format!(
            "DEF:{vname}={}:{ds}:{cf}",
            escape_colons(&path.to_string_lossy())
        ));
        self
    }

    /// `CDEF:vname=rpn`.
    pub fn cdef(&mut self, vname: &str, rpn: &str) -> &mut Self {
        self.elements.push(format!("CDEF:{vname}={rpn}"));
        self
    }

    /// `XPORT:vname:label`.
    pub fn xport(&mut self, vname: &str, label: &str) -> &mut Self {
        self.elements
            .push(format!("XPORT:{vname}:{}", escape_colons(label)));
        self
    }

    /// The statements added so far.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Renders the argument vector for `[start, end]` at `step` seconds.
    ///
    /// `default_daemon` and `default_max_rows` apply when the exporter sets
    /// none of its own.
    ///
    /// # Errors
    ///
    /// Returns an argument error if a statement contains a NUL byte.
    pub fn args(
        &self,
        start: i64,
        end: i64,
        step: u64,
        default_daemon: Option<&str>,
    ) -> Result<ArgVec> {
        self.args_with_defaults(start, end, step, default_daemon, None)
    }

    pub(crate) fn args_with_defaults(
        &self,
        start: i64,
        end: i64,
        step: u64,
        default_daemon: Option<&str>,
        default_max_rows: Option<u32>,
    ) -> Result<ArgVec> {
        let mut argv = ArgVec::from_args([
            "xport".to_string(),
            "-s".to_string(),
            start.to_string(),
            "-e".to_string(),
            end.to_string(),
            "--step".to_string(),
            step.to_string(),
        ])?;
        if let Some(rows) = self.max_rows.or(default_max_rows) {
            argv.push("-m")?;
            argv.push(&rows.to_string())?;
        }
        if let Some(daemon) = self.daemon.as_deref().or(default_daemon) {
            argv.push("--daemon")?;
            argv.push(daemon)?;
        }
        for element in &self.elements {
            argv.push(element)?;
        }
        Ok(argv)
    }
}

/// Exported columns.
///
/// Values are row-major: `values[row * legends.len() + column]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XportResult {
    /// Start of the exported range, seconds since the epoch.
    pub start: i64,
    /// End of the exported range.
    pub end: i64,
    /// Resolution in seconds.
    pub step: u64,
    /// Column labels, one per `XPORT` statement.
    pub legends: Vec<String>,
    /// Number of rows.
    pub row_count: usize,
    /// Row-major values; unknown samples are NaN.
    pub values: Vec<f64>,
}

impl XportResult {
    /// Value of column `column` in row `row`.
    pub fn value_at(&self, column: usize, row: usize) -> Option<f64> {
        if column >= self.legends.len() || row >= self.row_count {
            return None;
        }
        self.values.get(row * self.legends.len() + column).copied()
    }

    /// Iterates over `(timestamp, row values)`.
    pub fn rows(&self) -> impl Iterator<Item = (i64, &[f64])> {
        row_iter(self.start, self.step, self.legends.len(), &self.values)
    }
}
