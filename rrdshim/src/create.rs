//! Builder for `rrd_create_r` requests.
//!
//! A [`Creator`] collects the data source and archive definitions of a new
//! database. [`Client::create`](crate::client::Client::create) renders them
//! into librrd's argument vector.

use std::path::{Path, PathBuf};

use crate::schema::{ConsolidationFn, DsType};

/// A pending database creation.
///
/// # Example
///
/// ```rust
/// use rrdshim::create::Creator;
/// use rrdshim::schema::{ConsolidationFn, DsType};
///
/// let mut creator = Creator::new("/var/lib/rrd/load.rrd", 1_700_000_000, 300);
/// creator
///     .ds("load", DsType::Gauge, 600, Some(0.0), None)
///     .rra(ConsolidationFn::Average, 0.5, 1, 288)
///     .rra(ConsolidationFn::Max, 0.5, 12, 168);
///
/// assert_eq!(
///     creator.definitions(),
///     ["DS:load:GAUGE:600:0:U", "RRA:AVERAGE:0.5:1:288", "RRA:MAX:0.5:12:168"]
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    path: PathBuf,
    start: i64,
    step: u64,
    definitions: Vec<String>,
    overwrite: bool,
}

impl Creator {
    /// Starts a creation of `path` whose first update must be after `start`
    /// (seconds since the epoch), with a base interval of `step` seconds.
    pub fn new(path: impl Into<PathBuf>, start: i64, step: u64) -> Self {
        Self {
            path: path.into(),
            start,
            step,
            definitions: Vec::new(),
            overwrite: false,
        }
    }

    /// Adds a data source: `DS:name:TYPE:heartbeat:min:max`.
    ///
    /// Missing bounds render as `U`. For [`DsType::Compute`] use
    /// [`compute`](Self::compute) instead.
    pub fn ds(
        &mut self,
        name: &str,
        ds_type: DsType,
        heartbeat: u64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> &mut Self {
        self.definitions.push(format!(
            "DS:{name}:{ds_type}:{heartbeat}:{}:{}",
            bound(min),
            bound(max)
        ));
        self
    }

    /// Adds a computed data source: `DS:name:COMPUTE:rpn`.
    pub fn compute(&mut self, name: &str, rpn: &str) -> &mut Self {
        self.definitions
            .push(format!("DS:{name}:{}:{rpn}", DsType::Compute));
        self
    }

    /// Adds a round-robin archive: `RRA:CF:xff:steps:rows`.
    pub fn rra(&mut self, cf: ConsolidationFn, xff: f64, steps: u64, rows: u64) -> &mut Self {
        self.definitions
            .push(format!("RRA:{cf}:{xff}:{steps}:{rows}"));
        self
    }

    /// Adds a definition verbatim, e.g. a `RRA:HWPREDICT:...` archive.
    pub fn raw(&mut self, definition: impl Into<String>) -> &mut Self {
        self.definitions.push(definition.into());
        self
    }

    /// Allows replacing an existing file.
    pub fn overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }

    /// Target database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start time in seconds since the epoch.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Base interval in seconds.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The rendered definitions, in insertion order.
    pub fn definitions(&self) -> &[String] {
        &self.definitions
    }

    /// Whether an existing file may be replaced.
    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }
}

fn bound(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => "U".to_string(),
    }
}
